use async_trait::async_trait;

use crate::instrument::Instrument;
use crate::proto::{
    command::{Channel, Command},
    Result,
};
use crate::session::Session;

/// Rigol DP800 series programmable power supply.
///
/// The device applies setpoint and protection commands to the channel last
/// selected with `:INST:NSEL`, so every mutating call selects its channel
/// first. Measurements address the channel directly.
pub struct PowerSupply {
    session: Session,
}

impl PowerSupply {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub async fn select_channel(&mut self, chan: Channel) -> Result<()> {
        self.session.write(Command::SelectChannel(chan)).await
    }

    pub async fn turn_on(&mut self, chan: Channel) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetOutput(chan, true)).await
    }

    pub async fn turn_off(&mut self, chan: Channel) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetOutput(chan, false)).await
    }

    /// Output state as reported by the device.
    pub async fn output_state(&mut self, chan: Channel) -> Result<bool> {
        self.session.query_bool(Command::GetOutput(chan)).await
    }

    /// Sets the voltage of `chan`. With `max_current` the over-current
    /// protection is armed at that threshold, without it OCP is switched off.
    pub async fn set_voltage(
        &mut self,
        voltage: f64,
        max_current: Option<f64>,
        chan: Channel,
    ) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetVoltage(voltage)).await?;
        match max_current {
            Some(current) => {
                self.set_ocp(current, chan).await?;
                self.session.write(Command::SetOcpState(true)).await
            }
            None => self.session.write(Command::SetOcpState(false)).await,
        }
    }

    /// Counterpart of [`set_voltage`](Self::set_voltage) for the current
    /// setpoint and over-voltage protection.
    pub async fn set_current(
        &mut self,
        current: f64,
        max_voltage: Option<f64>,
        chan: Channel,
    ) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetCurrent(current)).await?;
        match max_voltage {
            Some(voltage) => {
                self.set_ovp(voltage, chan).await?;
                self.session.write(Command::SetOvpState(true)).await
            }
            None => self.session.write(Command::SetOvpState(false)).await,
        }
    }

    pub async fn set_ovp(&mut self, max_voltage: f64, chan: Channel) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetOvp(max_voltage)).await
    }

    pub async fn set_ocp(&mut self, max_current: f64, chan: Channel) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetOcp(max_current)).await
    }

    pub async fn toggle_ovp(&mut self, enabled: bool, chan: Channel) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetOvpState(enabled)).await
    }

    pub async fn toggle_ocp(&mut self, enabled: bool, chan: Channel) -> Result<()> {
        self.select_channel(chan).await?;
        self.session.write(Command::SetOcpState(enabled)).await
    }

    pub async fn measure_voltage(&mut self, chan: Channel) -> Result<f64> {
        self.session
            .query_f64(Command::MeasureChannelVoltage(chan))
            .await
    }

    pub async fn measure_current(&mut self, chan: Channel) -> Result<f64> {
        self.session
            .query_f64(Command::MeasureChannelCurrent(chan))
            .await
    }

    pub async fn measure_power(&mut self, chan: Channel) -> Result<f64> {
        self.session
            .query_f64(Command::MeasureChannelPower(chan))
            .await
    }
}

#[async_trait]
impl Instrument for PowerSupply {
    fn session(&mut self) -> &mut Session {
        &mut self.session
    }
}
