//! Blocking Swift REST client
//!
//! A thin implementation of the storage wire protocol: TempAuth style v1.0
//! authentication (auth endpoint returns X-Storage-Url and X-Auth-Token
//! headers), then object and container operations as plain HTTP verbs
//! against `{storage_url}/{container}/{object}` with the token attached.

use super::{
    AccountInfo, ClientError, Connector, ContainerInfo, GetResponse, ObjectClient, OpReceipt,
    Preauth,
};
use crate::config::creds::Credentials;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

const AUTH_TOKEN: &str = "X-Auth-Token";
const TRANS_ID: &str = "X-Trans-Id";

/// Connector that authenticates with credentials or reuses a preauth pair
pub struct SwiftConnector {
    creds: Credentials,
}

impl SwiftConnector {
    pub fn new(creds: Credentials) -> Self {
        Self { creds }
    }

    fn authenticate(&self, http: &Client) -> Result<Preauth, ClientError> {
        let response = http
            .get(&self.creds.endpoint)
            .header("X-Auth-User", &self.creds.username)
            .header("X-Auth-Key", &self.creds.password)
            .send()
            .map_err(|e| ClientError::Fault(format!("auth request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
            });
        }

        let header = |name: &str| -> Result<String, ClientError> {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    ClientError::Fault(format!("auth response missing {} header", name))
                })
        };
        Ok(Preauth {
            url: header("X-Storage-Url")?,
            token: header(AUTH_TOKEN)?,
        })
    }
}

impl Connector for SwiftConnector {
    fn connect(&self, preauth: Option<&Preauth>) -> Result<Box<dyn ObjectClient>, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ClientError::Fault(format!("http client: {}", e)))?;

        let auth = match preauth {
            Some(pair) => pair.clone(),
            None => self.authenticate(&http)?,
        };

        let mut client = SwiftClient { http, auth };
        // a fresh connection object is not proof of connectivity; make sure
        // the account actually answers before workers depend on it
        client.head_account()?;
        Ok(Box::new(client))
    }
}

/// One authenticated Swift connection
pub struct SwiftClient {
    http: Client,
    auth: Preauth,
}

impl SwiftClient {
    fn object_url(&self, container: &str, name: &str) -> String {
        format!("{}/{}/{}", self.auth.url, container, name)
    }

    fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.auth.url, container)
    }

    fn check(response: Response) -> Result<Response, ClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::Api {
                status: response.status().as_u16(),
            })
        }
    }

    fn transport(err: reqwest::Error) -> ClientError {
        ClientError::Fault(format!("transport error: {}", err))
    }

    fn transaction_id(response: &Response) -> String {
        response
            .headers()
            .get(TRANS_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    }

    fn count_header(response: &Response, name: &str) -> u64 {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

impl ObjectClient for SwiftClient {
    fn put_object(
        &mut self,
        container: &str,
        name: &str,
        data: &[u8],
    ) -> Result<OpReceipt, ClientError> {
        let response = self
            .http
            .put(self.object_url(container, name))
            .header(AUTH_TOKEN, &self.auth.token)
            .body(data.to_vec())
            .send()
            .map_err(Self::transport)?;
        let response = Self::check(response)?;
        Ok(OpReceipt {
            transaction_id: Self::transaction_id(&response),
        })
    }

    fn get_object(&mut self, container: &str, name: &str) -> Result<GetResponse, ClientError> {
        let response = self
            .http
            .get(self.object_url(container, name))
            .header(AUTH_TOKEN, &self.auth.token)
            .send()
            .map_err(Self::transport)?;
        let response = Self::check(response)?;
        Ok(GetResponse {
            transaction_id: Self::transaction_id(&response),
            body: Box::new(response),
        })
    }

    fn delete_object(&mut self, container: &str, name: &str) -> Result<OpReceipt, ClientError> {
        let response = self
            .http
            .delete(self.object_url(container, name))
            .header(AUTH_TOKEN, &self.auth.token)
            .send()
            .map_err(Self::transport)?;
        let response = Self::check(response)?;
        Ok(OpReceipt {
            transaction_id: Self::transaction_id(&response),
        })
    }

    fn head_container(&mut self, name: &str) -> Result<ContainerInfo, ClientError> {
        let response = self
            .http
            .head(self.container_url(name))
            .header(AUTH_TOKEN, &self.auth.token)
            .send()
            .map_err(Self::transport)?;
        let response = Self::check(response)?;
        Ok(ContainerInfo {
            object_count: Self::count_header(&response, "X-Container-Object-Count"),
        })
    }

    fn put_container(&mut self, name: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .put(self.container_url(name))
            .header(AUTH_TOKEN, &self.auth.token)
            .send()
            .map_err(Self::transport)?;
        Self::check(response).map(|_| ())
    }

    fn delete_container(&mut self, name: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.container_url(name))
            .header(AUTH_TOKEN, &self.auth.token)
            .send()
            .map_err(Self::transport)?;
        // 404 on delete is still a classified api error, callers decide
        if response.status() == StatusCode::NO_CONTENT || response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Api {
                status: response.status().as_u16(),
            })
        }
    }

    fn head_account(&mut self) -> Result<AccountInfo, ClientError> {
        let response = self
            .http
            .head(&self.auth.url)
            .header(AUTH_TOKEN, &self.auth.token)
            .send()
            .map_err(Self::transport)?;
        let response = Self::check(response)?;
        Ok(AccountInfo {
            container_count: Self::count_header(&response, "X-Account-Container-Count"),
        })
    }

    fn auth(&self) -> Preauth {
        self.auth.clone()
    }
}
