use async_trait::async_trait;

use crate::instrument::Instrument;
use crate::proto::{
    command::{Command, MeasureMode},
    Result,
};
use crate::session::Session;

/// Rigol DM3000 series digital multimeter.
pub struct Multimeter {
    session: Session,
}

impl Multimeter {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub async fn measure_voltage(&mut self, mode: MeasureMode) -> Result<f64> {
        self.session
            .query_f64(Command::MeasureVoltage(mode))
            .await
    }

    pub async fn measure_current(&mut self, mode: MeasureMode) -> Result<f64> {
        self.session
            .query_f64(Command::MeasureCurrent(mode))
            .await
    }
}

#[async_trait]
impl Instrument for Multimeter {
    fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// The DM3058 drops off the bus for a moment while resetting, so the
    /// error poll after `*RST` may time out. That case counts as success,
    /// and the device still gets its settle delay.
    async fn reset(&mut self) -> Result<()> {
        match self.session.reset().await {
            Err(err) if err.is_timeout() => {
                log::warn!("{}: ignoring timeout during reset", self.session.serial());
                tokio::time::sleep(self.session.config().delay).await;
                Ok(())
            }
            other => other,
        }
    }
}
