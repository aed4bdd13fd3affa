//! RL7023 AT-command driver: session establishment and UDP send/receive
//! over the Wi-SUN link (§4.D).

use echonet_lite::transport::SerialLine;
use echonet_lite::{ControllerError, Frame, FrameExchange, TransportError};
use log::{debug, info, warn};

use crate::error::ModemError;
use crate::state::{ModemEvent, ModemState, ModemStateMachine};
use crate::types::{ErxudpVariant, PanDesc};

/// UDP port ECHONET Lite rides on, both on the LAN and through the modem
/// (§6): `0x0E1A` = 3610.
const ECHONET_UDP_PORT_HEX: &str = "0E1A";

/// Scan dwell escalation bounds (§4.D, §8 invariant 3).
const SCAN_DWELL_START: u8 = 4;
const SCAN_DWELL_MAX: u8 = 8;

pub struct ModemDriver<S: SerialLine> {
    serial: S,
    send_seq: u64,
    read_seq: u64,
    state: ModemStateMachine,
    pan_desc: Option<PanDesc>,
    joined: bool,
    variant: Option<ErxudpVariant>,
}

impl<S: SerialLine> ModemDriver<S> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            send_seq: 0,
            read_seq: 0,
            state: ModemStateMachine::new(),
            pan_desc: None,
            joined: false,
            variant: None,
        }
    }

    pub fn state(&self) -> ModemState {
        self.state.current_state()
    }

    pub fn pan_desc(&self) -> Option<&PanDesc> {
        self.pan_desc.as_ref()
    }

    /// Writes one CRLF-terminated command and consumes its echo (§4.C
    /// invariant: `send` followed by `recv` first yields the echo).
    fn send_command(&mut self, command: &[u8]) -> Result<(), ModemError> {
        self.send_seq += 1;
        debug!("send#{}: {:?}", self.send_seq, String::from_utf8_lossy(command));
        self.serial.send(command)?;
        let echo = self.recv_line()?;
        debug!("echo: {:?}", String::from_utf8_lossy(&echo));
        Ok(())
    }

    fn recv_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let line = self.serial.recv()?;
        self.read_seq += 1;
        debug!("recv#{}: {:?}", self.read_seq, String::from_utf8_lossy(&line));
        Ok(line)
    }

    fn recv_ok(&mut self) -> Result<(), ModemError> {
        let line = self.recv_line()?;
        if line == b"OK" {
            Ok(())
        } else if let Some(code) = line.strip_prefix(b"ER") {
            Err(ModemError::CommandFailed(String::from_utf8_lossy(code).into_owned()))
        } else {
            Err(ModemError::UnexpectedResponse(String::from_utf8_lossy(&line).into_owned()))
        }
    }

    /// `SKVER` — firmware version query (§4.D, S5).
    pub fn version(&mut self) -> Result<String, ModemError> {
        self.send_command(b"SKVER\r\n")?;
        let line = self.recv_line()?;
        let version = String::from_utf8_lossy(&line);
        let version = version
            .strip_prefix("EVER ")
            .ok_or_else(|| ModemError::UnexpectedResponse(version.clone().into_owned()))?
            .to_string();
        self.recv_ok()?;
        Ok(version)
    }

    /// `SKSETPWD C <pwd>` — install the B-route password.
    pub fn set_b_route_password(&mut self, password: &str) -> Result<(), ModemError> {
        if password.is_empty() {
            return Err(ModemError::UnexpectedResponse("empty B-route password".into()));
        }
        self.send_command(format!("SKSETPWD C {password}\r\n").as_bytes())?;
        self.recv_ok()?;
        self.state.process_event(ModemEvent::PasswordSet);
        Ok(())
    }

    /// `SKSETRBID <id>` — install the B-route ID.
    pub fn set_b_route_id(&mut self, id: &str) -> Result<(), ModemError> {
        if id.is_empty() {
            return Err(ModemError::UnexpectedResponse("empty B-route ID".into()));
        }
        self.send_command(format!("SKSETRBID {id}\r\n").as_bytes())?;
        self.recv_ok()?;
        self.state.process_event(ModemEvent::IdSet);
        Ok(())
    }

    /// One `SKSCAN` attempt at a given dwell exponent. Returns `Some(PanDesc)`
    /// on `EVENT 20`, `None` on `EVENT 22` (not found).
    fn scan_once(&mut self, dwell: u8) -> Result<Option<PanDesc>, ModemError> {
        self.send_command(format!("SKSCAN 2 FFFFFFFF {dwell} 0\r\n").as_bytes())?;
        self.recv_ok()?;
        loop {
            let line = self.recv_line()?;
            let text = String::from_utf8_lossy(&line);
            if let Some(rest) = text.strip_prefix("EVENT ") {
                let code = rest.split_whitespace().next().unwrap_or("");
                match code {
                    "22" => return Ok(None),
                    "20" => return Ok(Some(self.receive_pan_desc()?)),
                    other => {
                        warn!("unexpected scan EVENT {other}");
                    }
                }
            }
        }
    }

    /// Parses the 7-line `EPANDESC` block following `EVENT 20` (§4.D scan
    /// dwell escalation). Only `Channel`, `Pan ID`, `Addr` are kept.
    fn receive_pan_desc(&mut self) -> Result<PanDesc, ModemError> {
        let header = self.recv_line()?;
        if header != b"EPANDESC" {
            return Err(ModemError::UnexpectedResponse(String::from_utf8_lossy(&header).into_owned()));
        }
        let mut desc = PanDesc::default();
        for _ in 0..7 {
            let line = self.recv_line()?;
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim_start();
            if let Some(value) = trimmed.strip_prefix("Channel:") {
                desc.channel = value.to_string();
            } else if let Some(value) = trimmed.strip_prefix("Pan ID:") {
                desc.pan_id = value.to_string();
            } else if let Some(value) = trimmed.strip_prefix("Addr:") {
                desc.mac_addr = value.to_string();
            }
            // Channel Page, LQI, Side, PairID are consumed and discarded.
        }
        Ok(desc)
    }

    /// Scans with escalating dwell 4..=8, giving up past 8 (§4.D, §8
    /// invariant 3).
    pub fn scan(&mut self) -> Result<PanDesc, ModemError> {
        let mut dwell = SCAN_DWELL_START;
        loop {
            if let Some(desc) = self.scan_once(dwell)? {
                self.state.process_event(ModemEvent::ScanFound);
                self.pan_desc = Some(desc.clone());
                return Ok(desc);
            }
            dwell += 1;
            if dwell > SCAN_DWELL_MAX {
                return Err(ModemError::ScanExhausted);
            }
        }
    }

    /// `SKLL64 <mac>` — translate a 16-hex MAC into a link-local IPv6 address.
    pub fn ll64(&mut self, mac: &str) -> Result<String, ModemError> {
        self.send_command(format!("SKLL64 {mac}\r\n").as_bytes())?;
        let line = self.recv_line()?;
        let addr = String::from_utf8_lossy(&line).into_owned();
        self.state.process_event(ModemEvent::Ll64Resolved);
        Ok(addr)
    }

    /// `SKSREG S2 <channel>`.
    pub fn sreg_s2(&mut self, channel: &str) -> Result<(), ModemError> {
        self.send_command(format!("SKSREG S2 {channel}\r\n").as_bytes())?;
        self.recv_line()?; // register commands do not check the reply (§4.D)
        Ok(())
    }

    /// `SKSREG S3 <pan_id>`.
    pub fn sreg_s3(&mut self, pan_id: &str) -> Result<(), ModemError> {
        self.send_command(format!("SKSREG S3 {pan_id}\r\n").as_bytes())?;
        self.recv_line()?;
        self.state.process_event(ModemEvent::Registered);
        Ok(())
    }

    /// `SKJOIN <ipv6>` — begin PANA authentication. `EVENT 24` fails,
    /// `EVENT 25` succeeds; everything else (PANA `ERXUDP`, informational
    /// `EVENT`s) is logged and skipped (§4.D).
    pub fn join(&mut self, ipv6_addr: &str) -> Result<(), ModemError> {
        self.send_command(format!("SKJOIN {ipv6_addr}\r\n").as_bytes())?;
        self.recv_line()?;
        loop {
            let line = match self.recv_line() {
                Ok(line) => line,
                Err(TransportError::Timeout) => continue, // non-fatal inside this loop (§4.D, §7)
                Err(err) => return Err(ModemError::Transport(err)),
            };
            let text = String::from_utf8_lossy(&line);
            if let Some(rest) = text.strip_prefix("EVENT ") {
                let code = rest.split_whitespace().next().unwrap_or("");
                match code {
                    "24" => return Err(ModemError::JoinFailed),
                    "25" => {
                        self.joined = true;
                        self.state.process_event(ModemEvent::Joined);
                        return Ok(());
                    }
                    other => debug!("join: informational EVENT {other}"),
                }
            }
            // ERXUDP lines during the PANA handshake are logged and skipped.
        }
    }

    /// Orchestrates the full session: password, ID, scan, LL64,
    /// register, join (§4.D `Connect`).
    pub fn connect(&mut self, b_route_id: &str, b_route_password: &str) -> Result<(), ModemError> {
        self.set_b_route_password(b_route_password)?;
        self.set_b_route_id(b_route_id)?;
        let pan_desc = self.scan()?;
        let ipv6_addr = self.ll64(&pan_desc.mac_addr)?;
        if let Some(desc) = &mut self.pan_desc {
            desc.ipv6_addr = ipv6_addr.clone();
        }
        self.sreg_s2(&pan_desc.channel)?;
        self.sreg_s3(&pan_desc.pan_id)?;
        self.join(&ipv6_addr)?;
        info!("Wi-SUN session established, channel={}", pan_desc.channel);
        Ok(())
    }

    /// `SKSENDTO` — send UDP to port `0x0E1A` and wait for the matching
    /// `ERXUDP` reply (§4.D Send operation).
    pub fn send(&mut self, ipv6_addr: &str, payload: &[u8]) -> Result<Vec<u8>, ModemError> {
        let len_hex = format!("{:04X}", payload.len());
        let mut command = format!(
            "SKSENDTO 1 {ipv6_addr} {ECHONET_UDP_PORT_HEX} 1 0 {len_hex} "
        )
        .into_bytes();
        command.extend_from_slice(payload);
        command.extend_from_slice(b"\r\n");
        self.send_command(&command)?;

        loop {
            let line = self.recv_line()?;
            let text = String::from_utf8_lossy(&line);
            if let Some(rest) = text.strip_prefix("EVENT ") {
                let code = rest.split_whitespace().next().unwrap_or("");
                if code != "21" {
                    warn!("unexpected EVENT {code} while waiting for SKSENDTO reply");
                }
                continue;
            }
            if let Some(rest) = text.strip_prefix("ERXUDP ") {
                if let Some(bytes) = self.parse_erxudp(rest)? {
                    return Ok(bytes);
                }
                continue;
            }
        }
    }

    /// Parses one `ERXUDP` line's fields (§4.D, §9): `sender dest rport
    /// lport senderlla secured side datalen data`, optionally with an RSSI
    /// field inserted before `data` on some firmware revisions. `datalen`
    /// and `data` are always the last two tokens regardless of that
    /// optional field, so they're indexed from the back rather than at a
    /// fixed offset. Returns `None` when the datagram is PANA (port 716)
    /// or MLE (port 19788) traffic, which is logged and skipped rather
    /// than handed to the caller.
    fn parse_erxudp(&mut self, rest: &str) -> Result<Option<Vec<u8>>, ModemError> {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() < 9 {
            return Err(ModemError::UnexpectedResponse(format!("short ERXUDP: {rest}")));
        }
        let lport = u32::from_str_radix(tokens[3], 16)
            .map_err(|_| ModemError::UnexpectedResponse(format!("bad LPORT in ERXUDP: {rest}")))?;
        let datalen = usize::from_str_radix(tokens[tokens.len() - 2], 16)
            .map_err(|_| ModemError::UnexpectedResponse(format!("bad DATALEN in ERXUDP: {rest}")))?;
        let data_token = tokens[tokens.len() - 1];

        match lport {
            0x0E1A => {
                let variant = *self.variant.get_or_insert_with(|| {
                    ErxudpVariant::detect(datalen, data_token.as_bytes())
                });
                let bytes = match variant {
                    ErxudpVariant::HexAscii => hex_decode(data_token)
                        .map_err(|_| ModemError::UnexpectedResponse(format!("bad hex ERXUDP data: {rest}")))?,
                    ErxudpVariant::Binary => data_token.as_bytes().to_vec(),
                };
                Ok(Some(bytes))
            }
            716 => {
                debug!("skipping PANA ERXUDP during steady state");
                Ok(None)
            }
            19788 => {
                debug!("skipping MLE ERXUDP");
                Ok(None)
            }
            other => {
                debug!("skipping ERXUDP on unrecognized port {other}");
                Ok(None)
            }
        }
    }

    /// `SKTERM` — terminate the PANA session (§4.D, §5 cancellation).
    pub fn term(&mut self) -> Result<(), ModemError> {
        self.send_command(b"SKTERM\r\n")?;
        self.recv_line()?;
        self.joined = false;
        self.state.process_event(ModemEvent::Terminated);
        Ok(())
    }

    /// Terminates the session if joined, then releases the port.
    pub fn close(mut self) -> Result<(), ModemError> {
        if self.joined {
            self.term()?;
        }
        self.serial.close();
        Ok(())
    }
}

impl<S: SerialLine> FrameExchange for ModemDriver<S> {
    fn exchange(&mut self, frame: &Frame) -> Result<Frame, ControllerError> {
        let ipv6_addr = self
            .pan_desc
            .as_ref()
            .map(|desc| desc.ipv6_addr.clone())
            .ok_or_else(|| ControllerError::Network("modem session not joined".into()))?;
        let response_bytes = self.send(&ipv6_addr, &frame.serialize()).map_err(ControllerError::from)?;
        Frame::parse(&response_bytes)
            .map_err(|err| ControllerError::Network(format!("malformed ECHONET frame from modem: {err}")))
    }
}

fn hex_decode(text: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16))
        .collect()
}
