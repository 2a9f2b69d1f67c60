//! Glob message types
//!
//! One struct per wire type. Field order in each `write_body`/`read_body`
//! pair is the wire layout; all values are little-endian with no padding
//! other than the explicit pad bytes.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use super::codec::{BodyReader, BodyWriter, Direction, GlobBody, GlobVariant};
use super::{DecodingError, EncodingError};

/// Capacity of the text buffer in assert and debug messages
pub const TEXT_CAPACITY: usize = 200;

/// Capacity of the task name in timing results
pub const TASK_NAME_CAPACITY: usize = 32;

/// Number of data channels in a capture sample
pub const CAPTURE_CHANNELS: usize = 8;

/// Canonical type ids (protocol revision 2)
pub struct GlobId;

impl GlobId {
    /// [`AssertMessage`]
    pub const ASSERT_MESSAGE: u8 = 0;
    /// [`DebugMessage`]
    pub const DEBUG_MESSAGE: u8 = 1;
    /// [`CaptureData`]
    pub const CAPTURE_DATA: u8 = 2;
    /// [`DrivingCommand`]
    pub const DRIVING_COMMAND: u8 = 3;
    /// [`CaptureCommand`]
    pub const CAPTURE_COMMAND: u8 = 4;
    /// [`StatusData`]
    pub const STATUS_DATA: u8 = 5;
    /// [`Modes`]
    pub const MODES: u8 = 14;
    /// [`RobotCommand`]
    pub const ROBOT_COMMAND: u8 = 15;
    /// [`Wave`]
    pub const WAVE: u8 = 17;
    /// [`PidParams`]
    pub const PID_PARAMS: u8 = 18;
    /// [`Request`]
    pub const REQUEST: u8 = 19;
    /// [`TaskTimingResult`]
    pub const TASK_TIMING_RESULT: u8 = 20;
}

/// Instance used when the sender does not address a particular entity
pub const DEFAULT_INSTANCE: u16 = 1;

/// A decoded or to-be-sent Glob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Glob {
    /// [`AssertMessage`]
    AssertMessage(AssertMessage),
    /// [`DebugMessage`]
    DebugMessage(DebugMessage),
    /// [`CaptureData`]
    CaptureData(CaptureData),
    /// [`DrivingCommand`]
    DrivingCommand(DrivingCommand),
    /// [`CaptureCommand`]
    CaptureCommand(CaptureCommand),
    /// [`StatusData`]
    StatusData(StatusData),
    /// [`Modes`]
    Modes(Modes),
    /// [`RobotCommand`]
    RobotCommand(RobotCommand),
    /// [`Wave`]
    Wave(Wave),
    /// [`PidParams`]
    PidParams(PidParams),
    /// [`Request`]
    Request(Request),
    /// [`TaskTimingResult`]
    TaskTimingResult(TaskTimingResult),
}

macro_rules! for_each_glob {
    ($glob:expr, $inner:ident => $body:expr) => {
        match $glob {
            Glob::AssertMessage($inner) => $body,
            Glob::DebugMessage($inner) => $body,
            Glob::CaptureData($inner) => $body,
            Glob::DrivingCommand($inner) => $body,
            Glob::CaptureCommand($inner) => $body,
            Glob::StatusData($inner) => $body,
            Glob::Modes($inner) => $body,
            Glob::RobotCommand($inner) => $body,
            Glob::Wave($inner) => $body,
            Glob::PidParams($inner) => $body,
            Glob::Request($inner) => $body,
            Glob::TaskTimingResult($inner) => $body,
        }
    };
}

impl Glob {
    /// Wire type id of this Glob
    pub fn type_id(&self) -> u8 {
        fn id<T: GlobBody>(_: &T) -> u8 {
            T::TYPE_ID
        }
        for_each_glob!(self, m => id(m))
    }

    /// Type name for logs
    pub fn name(&self) -> &'static str {
        fn name<T: GlobBody>(_: &T) -> &'static str {
            T::NAME
        }
        for_each_glob!(self, m => name(m))
    }

    /// Pack the body for this Glob's layout
    pub fn encode_body(&self) -> Result<Vec<u8>, EncodingError> {
        for_each_glob!(self, m => m.encode_body())
    }
}

macro_rules! impl_from_glob {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for Glob {
                fn from(m: $ty) -> Self {
                    Glob::$ty(m)
                }
            }

            impl GlobVariant for $ty {
                fn from_glob(glob: &Glob) -> Option<&Self> {
                    match glob {
                        Glob::$ty(m) => Some(m),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_glob!(
    AssertMessage,
    DebugMessage,
    CaptureData,
    DrivingCommand,
    CaptureCommand,
    StatusData,
    Modes,
    RobotCommand,
    Wave,
    PidParams,
    Request,
    TaskTimingResult,
);

/// A Glob together with the instance it is addressed to or came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Which entity of this type (controller number, requested instance, ...)
    pub instance: u16,
    /// The message itself
    pub glob: Glob,
}

impl Envelope {
    /// Wrap a Glob with the default instance
    pub fn new(glob: impl Into<Glob>) -> Self {
        Self::with_instance(DEFAULT_INSTANCE, glob)
    }

    /// Wrap a Glob for a specific instance
    pub fn with_instance(instance: u16, glob: impl Into<Glob>) -> Self {
        Self {
            instance,
            glob: glob.into(),
        }
    }

    /// Wire type id
    pub fn type_id(&self) -> u8 {
        self.glob.type_id()
    }
}

/// Clip `text` to at most `capacity` bytes without splitting a character
fn clip(text: &str, capacity: usize) -> String {
    if text.len() <= capacity {
        return text.to_string();
    }
    let mut end = capacity;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

// ---------------------------------------------------------------------------
// Assert / debug text
// ---------------------------------------------------------------------------

/// What the robot does after a failed assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertAction {
    /// Keep running
    Continue = 0,
    /// Reboot the controller
    Restart = 1,
    /// Halt until reset
    Stop = 2,
}

impl TryFrom<u32> for AssertAction {
    type Error = DecodingError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AssertAction::Continue),
            1 => Ok(AssertAction::Restart),
            2 => Ok(AssertAction::Stop),
            _ => Err(DecodingError::InvalidValue {
                field: "action",
                value,
            }),
        }
    }
}

/// Assertion failure reported by the firmware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertMessage {
    /// What the firmware does next
    pub action: AssertAction,
    /// Message text
    pub message: String,
    /// Whether the firmware filled in the message
    pub valid: bool,
}

impl GlobBody for AssertMessage {
    const TYPE_ID: u8 = GlobId::ASSERT_MESSAGE;
    const NAME: &'static str = "AssertMessage";
    const BODY_LEN: usize = 4 + TEXT_CAPACITY + 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.u32(self.action as u32);
        w.text("message", &self.message, TEXT_CAPACITY)?;
        w.u32(self.valid as u32);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            action: AssertAction::try_from(r.u32()?)?,
            message: r.text(TEXT_CAPACITY)?,
            valid: r.u32()? != 0,
        })
    }
}

/// Free-form text from the firmware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugMessage {
    /// Message text
    pub message: String,
    /// Whether the firmware filled in the message
    pub valid: bool,
}

impl DebugMessage {
    /// A valid message; encoding fails if `message` exceeds the text buffer
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            valid: true,
        }
    }

    /// A valid message clipped to the text buffer
    pub fn truncated(message: &str) -> Self {
        Self::new(clip(message, TEXT_CAPACITY))
    }
}

impl GlobBody for DebugMessage {
    const TYPE_ID: u8 = GlobId::DEBUG_MESSAGE;
    const NAME: &'static str = "DebugMessage";
    const BODY_LEN: usize = TEXT_CAPACITY + 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.text("message", &self.message, TEXT_CAPACITY)?;
        w.u32(self.valid as u32);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            message: r.text(TEXT_CAPACITY)?,
            valid: r.u32()? != 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Data capture
// ---------------------------------------------------------------------------

/// One captured sample: time plus eight channels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptureData {
    /// Seconds
    pub time: f32,
    /// One value per capture channel
    pub channels: [f32; CAPTURE_CHANNELS],
}

impl CaptureData {
    /// Time followed by the channels, as one row
    pub fn as_row(&self) -> [f32; CAPTURE_CHANNELS + 1] {
        let mut row = [0.0; CAPTURE_CHANNELS + 1];
        row[0] = self.time;
        row[1..].copy_from_slice(&self.channels);
        row
    }
}

impl GlobBody for CaptureData {
    const TYPE_ID: u8 = GlobId::CAPTURE_DATA;
    const NAME: &'static str = "CaptureData";
    const BODY_LEN: usize = 4 * (1 + CAPTURE_CHANNELS);

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.f32(self.time);
        for &value in &self.channels {
            w.f32(value);
        }
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        let time = r.f32()?;
        let mut channels = [0.0; CAPTURE_CHANNELS];
        for value in channels.iter_mut() {
            *value = r.f32()?;
        }
        Ok(Self { time, channels })
    }
}

/// Start, stop or acknowledge a data capture.
///
/// The robot echoes this back with `total_samples` filled in once a capture
/// finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureCommand {
    /// Start (true) or stop (false)
    pub is_start: bool,
    /// Start paused
    pub paused: bool,
    /// Capture rate in Hz
    pub freq: u16,
    /// Samples requested
    pub desired_samples: u32,
    /// Samples actually recorded, filled in by the robot
    pub total_samples: u32,
}

impl CaptureCommand {
    /// Start capturing `samples` samples at `rate_hz`
    pub fn start(rate_hz: f64, samples: u64, paused: bool) -> Result<Self, EncodingError> {
        let freq = rate_hz.round();
        if !freq.is_finite() || freq < 0.0 || freq > u16::MAX as f64 {
            return Err(EncodingError::FieldOverflow {
                field: "freq",
                value: rate_hz,
            });
        }
        let desired_samples = u32::try_from(samples).map_err(|_| EncodingError::FieldOverflow {
            field: "desired_samples",
            value: samples as f64,
        })?;
        Ok(Self {
            is_start: true,
            paused,
            freq: freq as u16,
            desired_samples,
            total_samples: 0,
        })
    }

    /// Stop any running capture
    pub fn stop() -> Self {
        Self::default()
    }
}

impl GlobBody for CaptureCommand {
    const TYPE_ID: u8 = GlobId::CAPTURE_COMMAND;
    const NAME: &'static str = "CaptureCommand";
    const BODY_LEN: usize = 1 + 1 + 2 + 4 + 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.flag(self.is_start)
            .flag(self.paused)
            .u16(self.freq)
            .u32(self.desired_samples)
            .u32(self.total_samples);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            is_start: r.flag()?,
            paused: r.flag()?,
            freq: r.u16()?,
            desired_samples: r.u32()?,
            total_samples: r.u32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Driving
// ---------------------------------------------------------------------------

/// Movement bitmask for [`DrivingCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Movement(u32);

impl Movement {
    /// No movement
    pub const NONE: Movement = Movement(0);
    /// Drive forward
    pub const FORWARD: Movement = Movement(1);
    /// Drive backward
    pub const REVERSE: Movement = Movement(2);
    /// Turn clockwise
    pub const TURN_RIGHT: Movement = Movement(4);
    /// Turn counter-clockwise
    pub const TURN_LEFT: Movement = Movement(8);
    /// Stop moving
    pub const STOP: Movement = Movement(16);

    const ALL: u32 = 0x1F;

    /// Build from raw bits, rejecting unknown bits
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::ALL == 0).then_some(Movement(bits))
    }

    /// Raw bits
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set
    pub fn contains(self, other: Movement) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Movement {
    type Output = Movement;

    fn bitor(self, rhs: Movement) -> Movement {
        Movement(self.0 | rhs.0)
    }
}

/// Manual driving input
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrivingCommand {
    /// Requested movements
    pub movement: Movement,
    /// m/s
    pub linear_velocity: f32,
    /// rad/s
    pub angular_velocity: f32,
}

impl DrivingCommand {
    /// Movement with zero velocities, letting the robot use its defaults
    pub fn movement(movement: Movement) -> Self {
        Self {
            movement,
            ..Self::default()
        }
    }
}

impl GlobBody for DrivingCommand {
    const TYPE_ID: u8 = GlobId::DRIVING_COMMAND;
    const NAME: &'static str = "DrivingCommand";
    const BODY_LEN: usize = 12;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        let bits = self.movement.bits();
        if Movement::from_bits(bits).is_none() {
            return Err(EncodingError::InvalidField {
                field: "movement",
                value: bits,
            });
        }
        w.u32(bits).f32(self.linear_velocity).f32(self.angular_velocity);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        let bits = r.u32()?;
        let movement = Movement::from_bits(bits).ok_or(DecodingError::InvalidValue {
            field: "movement",
            value: bits,
        })?;
        Ok(Self {
            movement,
            linear_velocity: r.f32()?,
            angular_velocity: r.f32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Convert an angular velocity in rad/s to revolutions per minute
pub fn rad_per_sec_to_rpm(rad_per_sec: f32) -> f32 {
    rad_per_sec * 60.0 / (2.0 * PI)
}

/// Values computed from the raw status fields at decode time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusDerived {
    /// Degrees
    pub roll_deg: f32,
    /// Degrees
    pub pitch_deg: f32,
    /// Degrees
    pub yaw_deg: f32,
    /// deg/s
    pub yaw_rate_deg: f32,
    /// Left wheel speed
    pub left_rpm: f32,
    /// Right wheel speed
    pub right_rpm: f32,
    /// Left duty cycle, percent
    pub left_pwm_percent: f32,
    /// Right duty cycle, percent
    pub right_pwm_percent: f32,
    /// Battery voltage times left duty cycle
    pub left_voltage: f32,
    /// Battery voltage times right duty cycle
    pub right_voltage: f32,
}

impl StatusDerived {
    /// Apply the display conversions to a raw status
    pub fn compute(status: &StatusData) -> Self {
        Self {
            roll_deg: status.roll.to_degrees(),
            pitch_deg: status.pitch.to_degrees(),
            yaw_deg: status.yaw.to_degrees(),
            yaw_rate_deg: status.yaw_rate.to_degrees(),
            left_rpm: rad_per_sec_to_rpm(status.left_speed),
            right_rpm: rad_per_sec_to_rpm(status.right_speed),
            left_pwm_percent: status.left_pwm * 100.0,
            right_pwm_percent: status.right_pwm * 100.0,
            left_voltage: status.battery_voltage * status.left_pwm,
            right_voltage: status.battery_voltage * status.right_pwm,
        }
    }
}

/// Periodic robot status
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusData {
    /// Volts
    pub battery_voltage: f32,
    /// Radians
    pub roll: f32,
    /// Radians
    pub pitch: f32,
    /// Radians
    pub yaw: f32,
    /// Top level mode
    pub main_mode: u8,
    /// Mode within the main mode
    pub sub_mode: u8,
    /// State within the mode
    pub state: u8,
    /// Left wheel speed, rad/s
    pub left_speed: f32,
    /// Right wheel speed, rad/s
    pub right_speed: f32,
    /// Left motor duty as a fraction of battery voltage, -1 to 1
    pub left_pwm: f32,
    /// Right motor duty, same scale
    pub right_pwm: f32,
    /// Rad/s
    pub yaw_rate: f32,
    /// Firmware protocol version
    pub firmware_version: u32,
    /// Not transmitted; filled in on decode
    pub derived: StatusDerived,
}

impl StatusData {
    /// Recompute the derived fields from the raw ones
    pub fn with_derived(mut self) -> Self {
        self.derived = StatusDerived::compute(&self);
        self
    }
}

impl GlobBody for StatusData {
    const TYPE_ID: u8 = GlobId::STATUS_DATA;
    const NAME: &'static str = "StatusData";
    const BODY_LEN: usize = 4 * 4 + 4 + 5 * 4 + 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.f32(self.battery_voltage)
            .f32(self.roll)
            .f32(self.pitch)
            .f32(self.yaw)
            .u8(self.main_mode)
            .u8(self.sub_mode)
            .u8(self.state)
            .u8(0)
            .f32(self.left_speed)
            .f32(self.right_speed)
            .f32(self.left_pwm)
            .f32(self.right_pwm)
            .f32(self.yaw_rate)
            .u32(self.firmware_version);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        let battery_voltage = r.f32()?;
        let roll = r.f32()?;
        let pitch = r.f32()?;
        let yaw = r.f32()?;
        let main_mode = r.u8()?;
        let sub_mode = r.u8()?;
        let state = r.u8()?;
        let _pad = r.u8()?;
        let status = Self {
            battery_voltage,
            roll,
            pitch,
            yaw,
            main_mode,
            sub_mode,
            state,
            left_speed: r.f32()?,
            right_speed: r.f32()?,
            left_pwm: r.f32()?,
            right_pwm: r.f32()?,
            yaw_rate: r.f32()?,
            firmware_version: r.u32()?,
            derived: StatusDerived::default(),
        };
        Ok(status.with_derived())
    }
}

// ---------------------------------------------------------------------------
// Modes and commands
// ---------------------------------------------------------------------------

/// Operating mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modes {
    /// Top level mode
    pub main_mode: u8,
    /// Mode within the main mode
    pub sub_mode: u8,
    /// State within the mode
    pub state: u8,
}

impl GlobBody for Modes {
    const TYPE_ID: u8 = GlobId::MODES;
    const NAME: &'static str = "Modes";
    const BODY_LEN: usize = 3;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.u8(self.main_mode).u8(self.sub_mode).u8(self.state);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            main_mode: r.u8()?,
            sub_mode: r.u8()?,
            state: r.u8()?,
        })
    }
}

/// Robot level command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotCommandKind {
    /// Start the controllers
    Start = 0,
    /// Stop the controllers
    Stop = 1,
    /// Reset controller state
    Reset = 2,
    /// Report task timing results
    TaskTiming = 3,
}

impl TryFrom<u8> for RobotCommandKind {
    type Error = DecodingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RobotCommandKind::Start),
            1 => Ok(RobotCommandKind::Stop),
            2 => Ok(RobotCommandKind::Reset),
            3 => Ok(RobotCommandKind::TaskTiming),
            _ => Err(DecodingError::InvalidValue {
                field: "command",
                value: value as u32,
            }),
        }
    }
}

/// Command for the robot as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotCommand {
    /// What to do
    pub command: RobotCommandKind,
}

impl RobotCommand {
    /// Command of the given kind
    pub fn new(command: RobotCommandKind) -> Self {
        Self { command }
    }
}

impl GlobBody for RobotCommand {
    const TYPE_ID: u8 = GlobId::ROBOT_COMMAND;
    const NAME: &'static str = "RobotCommand";
    const BODY_LEN: usize = 1;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.u8(self.command as u8);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            command: RobotCommandKind::try_from(r.u8()?)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Experiment input
// ---------------------------------------------------------------------------

/// Shape of the experiment input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaveType {
    /// Hold `offset`
    #[default]
    Constant = 0,
    /// Sine of `mag` and `freq`
    Sine = 1,
    /// Square of `mag` and `freq`
    Square = 2,
    /// Triangle of `mag` and `freq`
    Triangle = 3,
    /// Rise, hold and fall times set the shape
    Trapezoid = 4,
}

impl TryFrom<u8> for WaveType {
    type Error = DecodingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WaveType::Constant),
            1 => Ok(WaveType::Sine),
            2 => Ok(WaveType::Square),
            3 => Ok(WaveType::Triangle),
            4 => Ok(WaveType::Trapezoid),
            _ => Err(DecodingError::InvalidValue {
                field: "wave_type",
                value: value as u32,
            }),
        }
    }
}

/// Experiment input waveform
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wave {
    /// Waveform shape
    pub wave_type: WaveType,
    /// Repeat instead of running once
    pub run_continuous: bool,
    /// Generator state, reported by the robot
    pub state: u8,
    /// Current output, reported by the robot
    pub value: f32,
    /// Amplitude
    pub mag: f32,
    /// Hz
    pub freq: f32,
    /// Seconds
    pub duration: f32,
    /// Added to every value
    pub offset: f32,
    /// Seconds into the wave
    pub time: f32,
    /// Trapezoid ramp up, seconds
    pub rise_time: f32,
    /// Trapezoid plateau, seconds
    pub hold_time: f32,
    /// Trapezoid ramp down, seconds
    pub fall_time: f32,
}

impl Wave {
    /// A constant, continuous input used for manual commands
    pub fn constant(offset: f32) -> Self {
        Self {
            wave_type: WaveType::Constant,
            run_continuous: true,
            offset,
            ..Self::default()
        }
    }
}

impl GlobBody for Wave {
    const TYPE_ID: u8 = GlobId::WAVE;
    const NAME: &'static str = "Wave";
    const BODY_LEN: usize = 4 + 9 * 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.u8(self.wave_type as u8)
            .flag(self.run_continuous)
            .u8(self.state)
            .u8(0)
            .f32(self.value)
            .f32(self.mag)
            .f32(self.freq)
            .f32(self.duration)
            .f32(self.offset)
            .f32(self.time)
            .f32(self.rise_time)
            .f32(self.hold_time)
            .f32(self.fall_time);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        let wave_type = WaveType::try_from(r.u8()?)?;
        let run_continuous = r.flag()?;
        let state = r.u8()?;
        let _pad = r.u8()?;
        Ok(Self {
            wave_type,
            run_continuous,
            state,
            value: r.f32()?,
            mag: r.f32()?,
            freq: r.f32()?,
            duration: r.f32()?,
            offset: r.f32()?,
            time: r.f32()?,
            rise_time: r.f32()?,
            hold_time: r.f32()?,
            fall_time: r.f32()?,
        })
    }
}

/// Gains and limits for one controller; the instance selects which
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidParams {
    /// Proportional gain
    pub kp: f32,
    /// Integral gain
    pub ki: f32,
    /// Derivative gain
    pub kd: f32,
    /// Integral clamp, lower bound
    pub integral_lo: f32,
    /// Integral clamp, upper bound
    pub integral_hi: f32,
    /// Output clamp, lower bound
    pub lo: f32,
    /// Output clamp, upper bound
    pub hi: f32,
}

impl GlobBody for PidParams {
    const TYPE_ID: u8 = GlobId::PID_PARAMS;
    const NAME: &'static str = "PidParams";
    const BODY_LEN: usize = 7 * 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.f32(self.kp)
            .f32(self.ki)
            .f32(self.kd)
            .f32(self.integral_lo)
            .f32(self.integral_hi)
            .f32(self.lo)
            .f32(self.hi);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            kp: r.f32()?,
            ki: r.f32()?,
            kd: r.f32()?,
            integral_lo: r.f32()?,
            integral_hi: r.f32()?,
            lo: r.f32()?,
            hi: r.f32()?,
        })
    }
}

/// Ask the robot to transmit a type.
///
/// Sent with instance 0 to request every instance of that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Type id the robot should send
    pub requested_type_id: u8,
}

impl Request {
    /// Request for a raw type id
    pub fn new(requested_type_id: u8) -> Self {
        Self { requested_type_id }
    }

    /// Request for a Glob type
    pub fn of<T: GlobBody>() -> Self {
        Self::new(T::TYPE_ID)
    }
}

impl GlobBody for Request {
    const TYPE_ID: u8 = GlobId::REQUEST;
    const NAME: &'static str = "Request";
    const BODY_LEN: usize = 1;
    const DIRECTION: Direction = Direction::SendOnly;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.u8(self.requested_type_id);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        Ok(Self {
            requested_type_id: r.u8()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Task timing
// ---------------------------------------------------------------------------

/// Convert timer ticks to microseconds; zero when the frequency is unknown
pub fn ticks_to_micros(ticks: u32, timer_frequency: u32) -> f64 {
    if timer_frequency == 0 {
        return 0.0;
    }
    ticks as f64 * 1_000_000.0 / timer_frequency as f64
}

/// Execution time statistics for one firmware task
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskTimingResult {
    /// Task name as set in firmware
    pub task_name: String,
    /// Hz
    pub timer_frequency: u32,
    /// Calls measured
    pub call_count: u32,
    /// Shortest run, timer ticks
    pub min_ticks: u32,
    /// Longest run, timer ticks
    pub max_ticks: u32,
    /// Mean run, timer ticks
    pub avg_ticks: u32,
    /// Shortest run, microseconds
    pub min_us: f64,
    /// Longest run, microseconds
    pub max_us: f64,
    /// Mean run, microseconds
    pub avg_us: f64,
}

impl TaskTimingResult {
    /// Recompute the microsecond fields from the tick counts
    pub fn with_derived(mut self) -> Self {
        self.min_us = ticks_to_micros(self.min_ticks, self.timer_frequency);
        self.max_us = ticks_to_micros(self.max_ticks, self.timer_frequency);
        self.avg_us = ticks_to_micros(self.avg_ticks, self.timer_frequency);
        self
    }
}

impl GlobBody for TaskTimingResult {
    const TYPE_ID: u8 = GlobId::TASK_TIMING_RESULT;
    const NAME: &'static str = "TaskTimingResult";
    const BODY_LEN: usize = TASK_NAME_CAPACITY + 5 * 4;

    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError> {
        w.text("task_name", &self.task_name, TASK_NAME_CAPACITY)?;
        w.u32(self.timer_frequency)
            .u32(self.call_count)
            .u32(self.min_ticks)
            .u32(self.max_ticks)
            .u32(self.avg_ticks);
        Ok(())
    }

    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError> {
        let result = Self {
            task_name: r.text(TASK_NAME_CAPACITY)?,
            timer_frequency: r.u32()?,
            call_count: r.u32()?,
            min_ticks: r.u32()?,
            max_ticks: r.u32()?,
            avg_ticks: r.u32()?,
            ..Self::default()
        };
        Ok(result.with_derived())
    }
}
