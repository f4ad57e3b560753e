use async_trait::async_trait;

use crate::proto::{response::Ident, Result};
use crate::session::Session;

/// Operations shared by every instrument driver.
///
/// Drivers own their [`Session`] and only have to hand it out; `reset`
/// may be overridden where an instrument needs special handling.
#[async_trait]
pub trait Instrument: Send {
    fn session(&mut self) -> &mut Session;

    async fn ident(&mut self) -> Result<Ident> {
        self.session().ident().await
    }

    async fn reset(&mut self) -> Result<()> {
        self.session().reset().await
    }

    async fn close(&mut self) -> Result<()> {
        self.session().close().await
    }
}
