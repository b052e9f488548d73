//! Analog microcontroller link.
//!
//! The microcontroller digitises the six analog inputs and also watches
//! the buttons and the 433 MHz receiver. It talks a line protocol over the
//! serial port:
//!
//! ```text
//!  Pi                          MCU
//!  │ ◀──────────── "A" ─────── │   handshake
//!  │ ───── "A" ──────────────▶ │
//!  │ ───── "V" ──────────────▶ │   voltage request
//!  │ ◀── "V", v0..v5, sum ──── │   frame, sum rounded to 4 places
//!  │ ◀── "O", pin|radio ────── │   open request
//!  │ ◀──────────── "B" ─────── │   button pin request
//!  │ ─── pins…, "B" ─────────▶ │
//!  │ ◀──────────── "R" ─────── │   radio key request
//!  │ ─── key | "xxxxxxxxxx" ─▶ │
//! ```
//!
//! A background thread owns the read half and answers MCU requests;
//! [`SerialAnalog::read`] sends `V` and waits for the next verified frame.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, log, trace, warn};

use crate::app::mode_watch::ModeWatch;
use crate::app::ports::AnalogSource;
use crate::app::queue::CommandQueue;
use crate::config::GateConfig;
use crate::error::SensorError;
use crate::pins::{self, ANALOG_CHANNELS};

/// How long a `read` waits for its voltage frame.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// How long start-up waits for the MCU's `A`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for the line following an `O`.
const TRIGGER_LINE_TIMEOUT: Duration = Duration::from_secs(1);
/// Decimal places of the frame checksum.
const CHECKSUM_SCALE: f64 = 10_000.0;
/// Sent in place of a missing radio key.
const NO_RADIO_KEY: &str = "xxxxxxxxxx";
pub const RADIO_KEY_LEN: usize = 8;

pub type Frame = [f32; ANALOG_CHANNELS];

/// Decode the six voltage lines and the checksum line following a `V`.
///
/// The frame is accepted when the sum of the voltages rounded to four
/// decimal places equals the checksum.
pub fn decode_voltage_frame<S: AsRef<str>>(lines: &[S]) -> Result<Frame, SensorError> {
    let [values @ .., checksum] = lines else {
        return Err(SensorError::BadFrame);
    };
    if values.len() != ANALOG_CHANNELS {
        return Err(SensorError::BadFrame);
    }

    let mut frame = [0.0_f32; ANALOG_CHANNELS];
    let mut sum = 0.0_f64;
    for (slot, line) in frame.iter_mut().zip(values) {
        let volts: f64 = line
            .as_ref()
            .trim()
            .parse()
            .map_err(|_| SensorError::BadFrame)?;
        let narrowed = volts as f32;
        if !narrowed.is_finite() {
            return Err(SensorError::BadFrame);
        }
        sum += volts;
        *slot = narrowed;
    }
    let checksum: f64 = checksum
        .as_ref()
        .trim()
        .parse()
        .map_err(|_| SensorError::BadFrame)?;
    if !checksum.is_finite() {
        return Err(SensorError::BadFrame);
    }

    if (sum * CHECKSUM_SCALE).round() == (checksum * CHECKSUM_SCALE).round() {
        Ok(frame)
    } else {
        warn!("Sum of voltages {sum} does not match checksum {checksum}");
        Err(SensorError::BadFrame)
    }
}

/// Reply to an `R` request.
pub fn radio_key_reply(key: Option<&str>) -> &str {
    match key.map(str::trim) {
        Some(key) if key.chars().count() == RADIO_KEY_LEN => {
            debug!("Sending radio secret key");
            key
        }
        _ => {
            warn!("Radio key is not {RADIO_KEY_LEN} characters long, please revise for radio operation");
            NO_RADIO_KEY
        }
    }
}

/// Reply to a `B` request: the three button pins back to back, then `B`.
pub fn button_pins_reply() -> String {
    let mut reply: String = pins::BUTTONS
        .iter()
        .map(|(pin, _)| pin.to_string())
        .collect();
    reply.push('B');
    reply
}

// ── Line reader ───────────────────────────────────────────────

/// Line splitter over a port with a read timeout. Timeouts are retried
/// until the caller's deadline, keeping any partial line.
struct Lines<R> {
    inner: R,
    buf: String,
}

impl<R: BufRead> Lines<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: String::new(),
        }
    }

    /// Next line without its terminator; `Ok(None)` at end of stream.
    fn next_line(&mut self, deadline: Option<Instant>) -> io::Result<Option<String>> {
        loop {
            match self.inner.read_line(&mut self.buf) {
                Ok(0) if self.buf.is_empty() => return Ok(None),
                Ok(_) => {
                    let line = self.buf.trim_end().to_owned();
                    self.buf.clear();
                    return Ok(Some(line));
                }
                Err(e) if is_transient(&e) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    debug!("Dropping non-ASCII serial line");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ── Bridge ────────────────────────────────────────────────────

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

fn send(writer: &SharedWriter, msg: &str) -> io::Result<()> {
    let mut w = writer.lock().unwrap_or_else(PoisonError::into_inner);
    w.write_all(msg.as_bytes())?;
    w.flush()
}

/// Background half of the link: parses MCU lines and answers requests.
struct Bridge<R> {
    lines: Lines<R>,
    writer: SharedWriter,
    frames: Sender<Frame>,
    queue: Arc<CommandQueue>,
    mode: ModeWatch,
    radio_key: Option<String>,
}

impl<R: BufRead> Bridge<R> {
    fn run(mut self, alive: &AtomicBool) {
        loop {
            let line = match self.lines.next_line(None) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    error!("Serial link closed by the microcontroller");
                    break;
                }
                Err(e) => {
                    error!("Shutting down serial bridge due to serial error: {e}");
                    break;
                }
            };
            let result = match line.as_str() {
                "V" => self.receive_voltages(),
                "O" => self.receive_trigger(),
                "R" => send(&self.writer, radio_key_reply(self.radio_key.as_deref())),
                "B" => {
                    debug!("Sending button pins to microcontroller");
                    send(&self.writer, &button_pins_reply())
                }
                "" => Ok(()),
                other => {
                    trace!("Ignoring serial line {other:?}");
                    Ok(())
                }
            };
            if let Err(e) = result {
                error!("Shutting down serial bridge due to serial error: {e}");
                break;
            }
        }
        alive.store(false, Ordering::Release);
    }

    fn receive_voltages(&mut self) -> io::Result<()> {
        let deadline = Instant::now() + READ_TIMEOUT;
        let mut lines = Vec::with_capacity(ANALOG_CHANNELS + 1);
        for _ in 0..=ANALOG_CHANNELS {
            match self.lines.next_line(Some(deadline)) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => return Ok(()),
                Err(e) if is_transient(&e) => break,
                Err(e) => return Err(e),
            }
        }
        match decode_voltage_frame(&lines) {
            Ok(frame) => {
                trace!("Voltage frame {frame:?}");
                // Nobody waiting is fine; the next read requests a fresh frame.
                let _ = self.frames.send(frame);
                Ok(())
            }
            Err(e) => {
                warn!("Discarding voltage frame ({e}), requesting another");
                send(&self.writer, "V")
            }
        }
    }

    fn receive_trigger(&mut self) -> io::Result<()> {
        let deadline = Instant::now() + TRIGGER_LINE_TIMEOUT;
        let message = match self.lines.next_line(Some(deadline)) {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(e) if is_transient(&e) => String::new(),
            Err(e) => return Err(e),
        };
        let level = self.mode.press_level();
        match message.parse::<u8>() {
            Ok(pin) => match pins::button_name(pin) {
                Some(name) => log!(level, "{name} button pressed"),
                None => warn!("Unknown button pressed (pin {pin})"),
            },
            Err(_) => log!(level, "Radio remote triggered open ({message:?})"),
        }
        self.queue.validate_and_put("open");
        Ok(())
    }
}

// ── Analog source ─────────────────────────────────────────────

/// Hardware [`AnalogSource`] backed by the microcontroller.
pub struct SerialAnalog {
    writer: SharedWriter,
    frames: Receiver<Frame>,
    alive: Arc<AtomicBool>,
    timeout: Duration,
}

impl SerialAnalog {
    /// Perform the handshake on `reader`/`writer` and start the bridge thread.
    ///
    /// `open` requests from the MCU go to `queue`; `mode` decides how loudly
    /// they are logged.
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        config: &GateConfig,
        queue: Arc<CommandQueue>,
        mode: ModeWatch,
    ) -> Result<Self, SensorError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
        let mut lines = Lines::new(reader);
        handshake(&mut lines, &writer, HANDSHAKE_TIMEOUT)?;

        let (tx, rx) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let bridge = Bridge {
            lines,
            writer: Arc::clone(&writer),
            frames: tx,
            queue,
            mode,
            radio_key: config.radio_key.clone(),
        };
        let flag = Arc::clone(&alive);
        thread::Builder::new()
            .name("serial-bridge".into())
            .spawn(move || bridge.run(&flag))
            .map_err(|_| SensorError::Unavailable)?;

        Ok(Self {
            writer,
            frames: rx,
            alive,
            timeout: READ_TIMEOUT,
        })
    }

    /// Open the configured serial device and connect over it.
    #[cfg(feature = "rpi")]
    pub fn open(
        config: &GateConfig,
        queue: Arc<CommandQueue>,
        mode: ModeWatch,
    ) -> Result<Self, SensorError> {
        let port = serialport::new(&config.serial_port, config.serial_baud)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|e| {
                warn!("Serial device {} not found: {e}", config.serial_port);
                SensorError::Unavailable
            })?;
        let writer = port.try_clone().map_err(|e| {
            warn!("Serial device {} cannot be shared: {e}", config.serial_port);
            SensorError::Unavailable
        })?;
        Self::connect(io::BufReader::new(port), writer, config, queue, mode)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Request a frame and wait for it.
    pub fn read_frame(&mut self) -> Result<Frame, SensorError> {
        if !self.is_alive() {
            return Err(SensorError::Unavailable);
        }
        // Stale frames answer an older request.
        while self.frames.try_recv().is_ok() {}
        send(&self.writer, "V").map_err(|_| SensorError::Unavailable)?;
        match self.frames.recv_timeout(self.timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(SensorError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(SensorError::Unavailable),
        }
    }
}

impl AnalogSource for SerialAnalog {
    fn read(&mut self, channel: u8) -> Result<f32, SensorError> {
        if usize::from(channel) >= ANALOG_CHANNELS {
            return Err(SensorError::InvalidChannel(channel));
        }
        self.read_frame().map(|frame| frame[usize::from(channel)])
    }
}

fn handshake<R: BufRead>(
    lines: &mut Lines<R>,
    writer: &SharedWriter,
    timeout: Duration,
) -> Result<(), SensorError> {
    let deadline = Instant::now() + timeout;
    loop {
        match lines.next_line(Some(deadline)) {
            Ok(Some(line)) if line == "A" => break,
            Ok(Some(_)) => {
                debug!("Waiting for serial handshake");
                if Instant::now() >= deadline {
                    return Err(SensorError::Timeout);
                }
            }
            Ok(None) => return Err(SensorError::Unavailable),
            Err(e) if is_transient(&e) => return Err(SensorError::Timeout),
            Err(_) => return Err(SensorError::Unavailable),
        }
    }
    send(writer, "A").map_err(|_| SensorError::Unavailable)?;
    info!("Serial handshake achieved");
    Ok(())
}
