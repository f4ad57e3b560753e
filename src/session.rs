use futures::{SinkExt, StreamExt};
use std::{io, pin::Pin, time::Duration};
use tokio_util::codec::Decoder;

use crate::proto::{
    codec::ScpiCodec,
    command::Command,
    response::{parse_bool, parse_f64, ErrorReport, Ident},
    transport::{BoxedTransport, Connector, UsbtmcConnector},
    ProtoError, Result,
};

trait AsyncReadWrite<S>: futures::Sink<S> + futures::Stream {}

impl<T, S> AsyncReadWrite<S> for T where T: futures::Sink<S> + futures::Stream {}

/// Timing and framing parameters of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause after every command before the device is talked to again.
    pub delay: Duration,
    /// Upper bound for waiting on a single response line.
    pub timeout: Duration,
    /// Log every outbound command.
    pub debug: bool,
    pub terminator: String,
}

impl SessionConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delay: crate::DEFAULT_DELAY,
            timeout: crate::DEFAULT_TIMEOUT,
            debug: false,
            terminator: crate::DEFAULT_TERMINATOR.to_string(),
        }
    }
}

/// Connection to one instrument.
///
/// Every [`write`](Session::write) is followed by a `SYST:ERR?` poll, and a
/// non-zero code in the answer is returned as [`ProtoError::Device`].
/// After [`close`](Session::close) all operations fail with
/// [`ProtoError::Closed`]; closing again is a no-op.
///
/// When a response times out, its late answer is read and dropped before
/// the next command is sent.
#[allow(clippy::type_complexity)]
pub struct Session {
    serial: String,
    identity: Option<String>,
    config: SessionConfig,
    read_failed: bool,
    /// Answers still in flight for reads that timed out.
    owed: usize,
    stream: Option<
        Pin<
            Box<
                dyn AsyncReadWrite<
                        Command,
                        Error = io::Error,
                        Item = std::result::Result<String, io::Error>,
                    > + Send,
            >,
        >,
    >,
}

impl Session {
    /// Wraps an already opened transport.
    pub fn new(serial: impl Into<String>, transport: BoxedTransport, config: SessionConfig) -> Self {
        let stream = ScpiCodec::new(config.terminator.clone()).framed(transport);

        Self {
            serial: serial.into(),
            identity: None,
            config,
            read_failed: false,
            owed: 0,
            stream: Some(Box::pin(stream)),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_faked(
        replies: Vec<crate::proto::fake::Reply>,
    ) -> (Self, crate::proto::fake::SentLog) {
        let buffer = crate::proto::fake::FakeBuffer::new(replies);
        let sent = buffer.sent();
        let config = SessionConfig::default().with_delay(Duration::ZERO);
        (Self::new("FAKE0001", Box::new(buffer), config), sent)
    }

    /// Finds the USBTMC device whose identification contains `serial`.
    pub async fn discover(serial: &str, config: SessionConfig) -> Result<Self> {
        Self::discover_with(&UsbtmcConnector::default(), serial, config).await
    }

    /// Probes the candidates of `connector` in order and keeps the first one
    /// whose `*IDN?` answer contains `serial`. Candidates that fail to open
    /// or answer are skipped, all others are closed again.
    pub async fn discover_with<C: Connector>(
        connector: &C,
        serial: &str,
        config: SessionConfig,
    ) -> Result<Self> {
        for id in connector.candidates()? {
            let transport = match connector.open(&id).await {
                Ok(transport) => transport,
                Err(err) => {
                    log::warn!("Skipping {}: {}", id, err);
                    continue;
                }
            };

            let mut session = Self::new(serial, transport, config.clone());
            match session.query(Command::Identify).await {
                Ok(identity) if identity.contains(serial) => {
                    log::debug!("Found {} at {}: {}", serial, id, identity);
                    session.identity = Some(identity);
                    return Ok(session);
                }
                Ok(identity) => log::debug!("Skipping {}: {}", id, identity),
                Err(err) => log::warn!("Skipping {}: {}", id, err),
            }

            if let Err(err) = session.close().await {
                log::warn!("Failed to close {}: {}", id, err);
            }
        }
        Err(ProtoError::NotFound(serial.to_string()))
    }

    /// Identification of every candidate of `connector`, for listing.
    pub async fn probe_all<C: Connector>(
        connector: &C,
        config: SessionConfig,
    ) -> Result<Vec<(C::Id, Result<String>)>> {
        let mut found = Vec::new();
        for id in connector.candidates()? {
            let identity = match connector.open(&id).await {
                Ok(transport) => {
                    let mut session = Self::new(id.to_string(), transport, config.clone());
                    let identity = session.query(Command::Identify).await;
                    if let Err(err) = session.close().await {
                        log::warn!("Failed to close {}: {}", id, err);
                    }
                    identity
                }
                Err(err) => Err(err.into()),
            };
            found.push((id, identity));
        }
        Ok(found)
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Identification string seen during discovery.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Sends `command` and checks the device error queue afterwards.
    pub async fn write(&mut self, command: impl Into<Command>) -> Result<()> {
        let command = command.into();
        self.send(command.clone(), &command).await?;
        tokio::time::sleep(self.config.delay).await;

        self.send(Command::SystemError, &command).await?;
        let response = self.receive(&command).await?;
        let report = match response.parse::<ErrorReport>() {
            Ok(report) => report,
            Err(_) => return Err(ProtoError::parse(&command, response)),
        };
        if report.is_error() {
            return Err(ProtoError::Device {
                command: command.to_string(),
                code: report.code,
                message: report.message,
            });
        }
        Ok(())
    }

    /// Sends `command` and returns the response line without its terminator.
    pub async fn query(&mut self, command: impl Into<Command>) -> Result<String> {
        let command = command.into();
        self.send(command.clone(), &command).await?;
        tokio::time::sleep(self.config.delay).await;
        self.receive(&command).await
    }

    pub async fn query_f64(&mut self, command: impl Into<Command>) -> Result<f64> {
        let command = command.into();
        let response = self.query(command.clone()).await?;
        parse_f64(&command, &response)
    }

    pub async fn query_bool(&mut self, command: impl Into<Command>) -> Result<bool> {
        let command = command.into();
        let response = self.query(command.clone()).await?;
        parse_bool(&command, &response)
    }

    pub async fn ident(&mut self) -> Result<Ident> {
        let response = self.query(Command::Identify).await?;
        response
            .parse::<Ident>()
            .map_err(|_| ProtoError::parse(Command::Identify, response))
    }

    /// `*RST` followed by an extra settle delay.
    pub async fn reset(&mut self) -> Result<()> {
        self.write(Command::Reset).await?;
        tokio::time::sleep(self.config.delay).await;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(mut stream) => {
                log::debug!("Closing session {}", self.serial);
                stream.close().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn send(&mut self, command: Command, context: &Command) -> Result<()> {
        if self.owed > 0 {
            self.drain_late_answers().await;
        }
        if self.config.debug {
            log::debug!("{} <- {}", self.serial, command);
        }
        let stream = self.stream.as_mut().ok_or(ProtoError::Closed)?;
        stream
            .send(command)
            .await
            .map_err(|err| ProtoError::transport(context, err))
    }

    async fn receive(&mut self, context: &Command) -> Result<String> {
        let timeout = self.config.timeout;
        let stream = self.stream.as_mut().ok_or(ProtoError::Closed)?;
        loop {
            match tokio::time::timeout(timeout, stream.next()).await {
                Ok(Some(Ok(line))) => {
                    log::trace!("{} -> {}", self.serial, line);
                    self.read_failed = false;
                    return Ok(line);
                }
                Ok(Some(Err(ioerr))) => {
                    self.read_failed = true;
                    return Err(ProtoError::transport(context, ioerr));
                }
                // The framed stream yields one `None` after a read error
                Ok(None) if std::mem::take(&mut self.read_failed) => continue,
                Ok(None) => return Err(ProtoError::Abort),
                Err(_) => {
                    self.owed += 1;
                    return Err(ProtoError::transport(
                        context,
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("No response within {:?}", timeout),
                        ),
                    ))
                }
            }
        }
    }

    /// Reads and drops the answers to timed out reads, so that none of them
    /// is taken for the response to the next command. Each one gets another
    /// `timeout` to arrive before it is considered lost.
    async fn drain_late_answers(&mut self) {
        let timeout = self.config.timeout;
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return,
        };
        while self.owed > 0 {
            match tokio::time::timeout(timeout, stream.next()).await {
                Ok(Some(Ok(line))) => {
                    log::debug!("{}: dropping late answer {:?}", self.serial, line);
                    self.owed -= 1;
                }
                Ok(Some(Err(err))) => {
                    log::warn!("{}: late answer failed: {}", self.serial, err);
                    self.read_failed = true;
                    self.owed -= 1;
                }
                Ok(None) if std::mem::take(&mut self.read_failed) => continue,
                Ok(None) => break,
                Err(_) => {
                    log::warn!("{}: late answer lost", self.serial);
                    break;
                }
            }
        }
        self.owed = 0;
    }
}
