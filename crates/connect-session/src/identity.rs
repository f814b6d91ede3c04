//! User identity resolution

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::resolver::Resolver;

impl Resolver {
    /// The id of the user this request acts for, `0` if none. Resolved once,
    /// then cached.
    pub async fn user_id(&mut self) -> Result<u64> {
        if let Some(user) = self.user {
            return Ok(user);
        }
        let user = self.user_from_available_data().await?;
        self.user = Some(user);
        Ok(user)
    }

    /// Profile of the current user from `/me`, or `None` when nobody is
    /// logged in. Reuses the profile fetched while resolving the user.
    pub async fn user_info(&mut self) -> Result<Option<Value>> {
        if self.user_id().await? == 0 {
            return Ok(None);
        }
        if let Some(profile) = &self.profile {
            return Ok(Some(profile.clone()));
        }
        let profile = self.get("/me").await?;
        self.profile = Some(profile.clone());
        Ok(Some(profile))
    }

    async fn user_from_available_data(&mut self) -> Result<u64> {
        if let Some(signed) = &self.signed_request {
            let Some(user) = signed.user_id() else {
                self.clear_session("signed_request").await?;
                return Ok(0);
            };
            self.session.update(move |f| f.user_id = Some(user)).await?;
            return Ok(user);
        }

        let persisted = self.session.load().await?;
        let cached_user = persisted.user_id.unwrap_or(0);
        let access_token = self.access_token().await?;

        let unchanged =
            cached_user != 0 && persisted.access_token.as_deref() == Some(access_token.as_str());
        if access_token == self.app.application_token() || unchanged {
            return Ok(cached_user);
        }

        let user = self.user_from_access_token().await?;
        if user == 0 {
            self.clear_session("profile_lookup").await?;
        } else {
            self.session.update(move |f| f.user_id = Some(user)).await?;
        }
        Ok(user)
    }

    /// Ask `/me` who the current token belongs to. Provider errors mean no
    /// user; store errors propagate.
    async fn user_from_access_token(&mut self) -> Result<u64> {
        match self.get("/me").await {
            Ok(profile) => {
                let user = profile_id(&profile).unwrap_or(0);
                if user != 0 {
                    self.profile = Some(profile);
                }
                Ok(user)
            }
            Err(Error::Api(e)) => {
                warn!(error = %e, "profile lookup failed");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

fn profile_id(profile: &Value) -> Option<u64> {
    match profile.get("id")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
