//! Typed calls to the REST collaborators. Failures come back as
//! [`ClientError::RemoteCall`]; callers log and keep the old state, they
//! never apply a change the server did not confirm.

use reqwest::Client;

use super::ClientError;
use crate::contacts::{ContactChange, ContactList, UserSearch};
use crate::profile::{Profile, ProfileUpdate};

pub struct RestClient {
    http: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn profile(&self) -> Result<Profile, ClientError> {
        Ok(self
            .http
            .get(self.url("/profile"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ClientError> {
        self.http
            .post(self.url("/profile"))
            .json(update)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn contacts(&self) -> Result<ContactList, ClientError> {
        Ok(self
            .http
            .get(self.url("/api/contacts"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn add_contact(&self, contact_email: &str) -> Result<(), ClientError> {
        self.http
            .post(self.url("/api/contacts"))
            .json(&ContactChange { contact_email: contact_email.to_owned() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn remove_contact(&self, contact_email: &str) -> Result<(), ClientError> {
        self.http
            .delete(self.url("/api/contacts"))
            .json(&ContactChange { contact_email: contact_email.to_owned() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn search_users(&self, query: &str) -> Result<UserSearch, ClientError> {
        Ok(self
            .http
            .get(self.url("/api/search_users"))
            .query(&[("query", query)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Callers must tear down the realtime channel first so presence is
    /// released before the session dies.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.http
            .get(self.url("/logout"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
