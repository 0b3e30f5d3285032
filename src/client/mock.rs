//! In-memory storage client for tests
//!
//! Behaves like a tiny object store: containers hold named objects, HEAD
//! reports counts, DELETE of a non-empty container answers 409. Errors can
//! be injected per connection attempt or per object operation, in order.

use super::{
    AccountInfo, ClientError, Connector, ContainerInfo, GetResponse, ObjectClient, OpReceipt,
    Preauth,
};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct MockStore {
    containers: HashMap<String, HashMap<String, u64>>,
}

impl MockStore {
    pub fn object_count(&self, container: &str) -> Option<u64> {
        self.containers.get(container).map(|objs| objs.len() as u64)
    }

    pub fn has_object(&self, container: &str, name: &str) -> bool {
        self.containers
            .get(container)
            .map(|objs| objs.contains_key(name))
            .unwrap_or(false)
    }

}

/// Connector producing clients over one shared in-memory store
#[derive(Default)]
pub struct MockConnector {
    store: Arc<Mutex<MockStore>>,
    connect_errors: Mutex<VecDeque<ClientError>>,
    op_errors: Arc<Mutex<VecDeque<ClientError>>>,
    op_delay: Mutex<std::time::Duration>,
    keepalives: Arc<AtomicU64>,
    txid_seq: Arc<AtomicU64>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artificial latency to every object operation
    pub fn set_op_delay(&self, delay: std::time::Duration) {
        *self.op_delay.lock().unwrap() = delay;
    }

    pub fn store(&self) -> Arc<Mutex<MockStore>> {
        self.store.clone()
    }

    /// Pre-populate a container with `count` objects named `{prefix}-1..count`
    pub fn seed_container(&self, container: &str, prefix: &str, count: u64, size: u64) {
        let mut store = self.store.lock().unwrap();
        let objects = store.containers.entry(container.to_string()).or_default();
        for i in 1..=count {
            objects.insert(format!("{}-{}", prefix, i), size);
        }
    }

    /// Create an empty container
    pub fn seed_empty_container(&self, container: &str) {
        self.store
            .lock()
            .unwrap()
            .containers
            .entry(container.to_string())
            .or_default();
    }

    /// Queue an error for the next connection attempt
    pub fn fail_next_connect(&self, err: ClientError) {
        self.connect_errors.lock().unwrap().push_back(err);
    }

    /// Queue an error consumed by the next object operation (any kind)
    pub fn fail_next_op(&self, err: ClientError) {
        self.op_errors.lock().unwrap().push_back(err);
    }

    /// Number of head_account keep-alive calls seen so far
    pub fn keepalive_count(&self) -> u64 {
        self.keepalives.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, _preauth: Option<&Preauth>) -> Result<Box<dyn ObjectClient>, ClientError> {
        if let Some(err) = self.connect_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Box::new(MockClient {
            store: self.store.clone(),
            op_errors: self.op_errors.clone(),
            op_delay: *self.op_delay.lock().unwrap(),
            keepalives: self.keepalives.clone(),
            txid_seq: self.txid_seq.clone(),
        }))
    }
}

pub struct MockClient {
    store: Arc<Mutex<MockStore>>,
    op_errors: Arc<Mutex<VecDeque<ClientError>>>,
    op_delay: std::time::Duration,
    keepalives: Arc<AtomicU64>,
    txid_seq: Arc<AtomicU64>,
}

impl MockClient {
    fn injected(&self) -> Option<ClientError> {
        if !self.op_delay.is_zero() {
            std::thread::sleep(self.op_delay);
        }
        self.op_errors.lock().unwrap().pop_front()
    }

    fn receipt(&self) -> OpReceipt {
        OpReceipt {
            transaction_id: format!("tx-mock-{}", self.txid_seq.fetch_add(1, Ordering::SeqCst)),
        }
    }
}

impl ObjectClient for MockClient {
    fn put_object(
        &mut self,
        container: &str,
        name: &str,
        data: &[u8],
    ) -> Result<OpReceipt, ClientError> {
        if let Some(err) = self.injected() {
            return Err(err);
        }
        let mut store = self.store.lock().unwrap();
        let Some(objects) = store.containers.get_mut(container) else {
            return Err(ClientError::Api { status: 404 });
        };
        objects.insert(name.to_string(), data.len() as u64);
        Ok(self.receipt())
    }

    fn get_object(&mut self, container: &str, name: &str) -> Result<GetResponse, ClientError> {
        if let Some(err) = self.injected() {
            return Err(err);
        }
        let store = self.store.lock().unwrap();
        let size = store
            .containers
            .get(container)
            .and_then(|objs| objs.get(name))
            .copied()
            .ok_or(ClientError::Api { status: 404 })?;
        Ok(GetResponse {
            transaction_id: self.receipt().transaction_id,
            body: Box::new(Cursor::new(vec![0u8; size as usize])),
        })
    }

    fn delete_object(&mut self, container: &str, name: &str) -> Result<OpReceipt, ClientError> {
        if let Some(err) = self.injected() {
            return Err(err);
        }
        let mut store = self.store.lock().unwrap();
        let removed = store
            .containers
            .get_mut(container)
            .and_then(|objs| objs.remove(name));
        match removed {
            Some(_) => Ok(self.receipt()),
            None => Err(ClientError::Api { status: 404 }),
        }
    }

    fn head_container(&mut self, name: &str) -> Result<ContainerInfo, ClientError> {
        let store = self.store.lock().unwrap();
        match store.object_count(name) {
            Some(object_count) => Ok(ContainerInfo { object_count }),
            None => Err(ClientError::Api { status: 404 }),
        }
    }

    fn put_container(&mut self, name: &str) -> Result<(), ClientError> {
        let mut store = self.store.lock().unwrap();
        store.containers.entry(name.to_string()).or_default();
        Ok(())
    }

    fn delete_container(&mut self, name: &str) -> Result<(), ClientError> {
        let mut store = self.store.lock().unwrap();
        match store.object_count(name) {
            None => Err(ClientError::Api { status: 404 }),
            Some(0) => {
                store.containers.remove(name);
                Ok(())
            }
            Some(_) => Err(ClientError::Api { status: 409 }),
        }
    }

    fn head_account(&mut self) -> Result<AccountInfo, ClientError> {
        self.keepalives.fetch_add(1, Ordering::SeqCst);
        let store = self.store.lock().unwrap();
        Ok(AccountInfo {
            container_count: store.containers.len() as u64,
        })
    }

    fn auth(&self) -> Preauth {
        Preauth {
            url: "mock://storage/v1/AUTH_test".to_string(),
            token: "mock-token".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_object_lifecycle() {
        let connector = MockConnector::new();
        let mut client = connector.connect(None).unwrap();

        client.put_container("c").unwrap();
        client.put_object("c", "o-1", b"12345").unwrap();
        assert_eq!(client.head_container("c").unwrap().object_count, 1);

        let mut body = Vec::new();
        client.get_object("c", "o-1").unwrap().body.read_to_end(&mut body).unwrap();
        assert_eq!(body.len(), 5);

        // non-empty container refuses deletion
        assert_eq!(client.delete_container("c").unwrap_err().status(), Some(409));
        client.delete_object("c", "o-1").unwrap();
        client.delete_container("c").unwrap();
        assert_eq!(client.head_container("c").unwrap_err().status(), Some(404));
    }

    #[test]
    fn test_error_injection() {
        let connector = MockConnector::new();
        connector.fail_next_connect(ClientError::Fault("boom".into()));
        assert!(connector.connect(None).is_err());

        let mut client = connector.connect(None).unwrap();
        client.put_container("c").unwrap();
        connector.fail_next_op(ClientError::Api { status: 503 });
        assert_eq!(
            client.put_object("c", "o", b"x").unwrap_err().status(),
            Some(503)
        );
        // queue drained, next op succeeds
        client.put_object("c", "o", b"x").unwrap();
    }

    #[test]
    fn test_head_account_counts_keepalives() {
        let connector = MockConnector::new();
        let mut client = connector.connect(None).unwrap();
        client.put_container("c").unwrap();
        assert_eq!(client.head_account().unwrap().container_count, 1);
        client.head_account().unwrap();
        assert_eq!(connector.keepalive_count(), 2);
    }

    #[test]
    fn test_seeded_container() {
        let connector = MockConnector::new();
        connector.seed_container("c", "obj", 50, 1024);
        let mut client = connector.connect(None).unwrap();
        assert_eq!(client.head_container("c").unwrap().object_count, 50);
        assert!(connector.store().lock().unwrap().has_object("c", "obj-50"));
    }
}
