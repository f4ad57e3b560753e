//!
//! This library drives Rigol bench instruments over USBTMC.
//!
//! <br>
//!
//! # Details
//!
//! - Instruments are reached through the Linux `usbtmc` kernel driver
//!   (`/dev/usbtmc*`). The user needs read/write access to those nodes.
//!
//! - Every command is followed by a `SYST:ERR?` poll; errors reported by the
//!   device come back as [`ProtoError::Device`].
//!
//! - Basic setup and connection
//!
//!   ```no_run
//!   use rigolctrl::{Channel, Instrument, PowerSupply, Session, SessionConfig};
//!   #[tokio::main]
//!   async fn main() -> rigolctrl::Result<()> {
//!       let session = Session::discover("DP8G194400109", SessionConfig::default()).await?;
//!       let mut psu = PowerSupply::new(session);
//!       let chan = Channel::default();
//!       psu.set_voltage(5.0, Some(0.5), chan).await?;
//!       psu.turn_on(chan).await?;
//!       eprintln!("Output: {} V", psu.measure_voltage(chan).await?);
//!       psu.close().await
//!   }
//!   ```
//!
//! # Supported devices
//!
//!  * Rigol DM3058 (multimeter)
//!  * Rigol DP821 and other DP800 power supplies
//!

use std::time::Duration;

pub mod instrument;
pub mod multimeter;
pub mod power_supply;
pub mod proto;
pub mod session;

pub use instrument::Instrument;
pub use multimeter::Multimeter;
pub use power_supply::PowerSupply;
pub use proto::command::{Channel, MeasureMode};
pub use proto::{ProtoError, Result};
pub use session::{Session, SessionConfig};

/// Where the kernel creates USBTMC device nodes.
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

/// Command processing time granted to the device after each command.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// How long a single response line is waited for. An answer arriving after
/// that is dropped before the next command goes out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Line terminator appended to outbound commands. USBTMC instruments accept a
/// bare LF; use [`SessionConfig::with_terminator`] with `"\r\n"` for CR/LF.
/// Inbound lines may end in either.
pub const DEFAULT_TERMINATOR: &str = "\n";
