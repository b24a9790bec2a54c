// src/installation.rs

use serde::{Deserialize, Serialize};

use crate::client::{run_blocking, CairnClient};
use crate::error::CairnError;
use crate::object::CairnObject;
use crate::storage::CURRENT_INSTALLATION_KEY;
use crate::transport::Transport;

/// The platform an installation runs on, in the server's lowercase wire
/// form.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Js,
    Ios,
    Android,
    Macos,
    Windows,
    Linux,
    Embedded,
}

/// An object in the `_Installation` class, one per install of the app.
///
/// Installations go through the ordinary object operations; this trait adds
/// the identity field and unlocks the current-installation cache.
pub trait CairnInstallation: CairnObject {
    /// The client-generated id identifying this install of the app.
    fn installation_id(&self) -> Option<&str>;
}

impl<T: Transport> CairnClient<T> {
    /// The cached current installation, if one has been saved or remembered
    /// since the store was last cleared.
    pub fn current_installation<I: CairnInstallation>(&self) -> Result<Option<I>, CairnError> {
        match self.store().get(CURRENT_INSTALLATION_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Caches `installation` as the current installation.
    pub fn set_current_installation<I: CairnInstallation>(
        &self,
        installation: &I,
    ) -> Result<(), CairnError> {
        self.store()
            .set(CURRENT_INSTALLATION_KEY, serde_json::to_value(installation)?);
        Ok(())
    }

    /// Drops the cached current installation. The server-side object is
    /// untouched.
    pub fn clear_current_installation(&self) {
        self.store().delete(CURRENT_INSTALLATION_KEY);
    }

    /// Saves `installation` like any object and refreshes the
    /// current-installation cache with the server's copy.
    pub async fn save_installation<I: CairnInstallation>(
        &self,
        installation: &I,
    ) -> Result<I, CairnError> {
        let saved = self.save(installation).await?;
        self.set_current_installation(&saved)?;
        Ok(saved)
    }

    /// Blocking [`CairnClient::save_installation`]. Must not be called from
    /// an async context.
    pub fn save_installation_blocking<I: CairnInstallation>(
        &self,
        installation: &I,
    ) -> Result<I, CairnError> {
        run_blocking(self.save_installation(installation))?
    }

    /// Runs [`CairnClient::save_installation`] on the ambient runtime and
    /// hands the result to `callback`.
    pub fn save_installation_with_callback<I, F>(&self, installation: &I, callback: F)
    where
        I: CairnInstallation,
        F: FnOnce(Result<I, CairnError>) + Send + 'static,
    {
        let client = self.clone();
        let installation = installation.clone();
        tokio::spawn(async move {
            callback(client.save_installation(&installation).await);
        });
    }
}
