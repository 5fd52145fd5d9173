//! Audio device module
//!
//! The capability traits the deck drives, plus a cpal/hound backend that
//! implements them: WAV recording, WAV playback and level metering.

mod device;
mod error;
mod host;
pub mod meter;
mod playback;
mod recording;

pub use device::{
    list_input_devices, list_output_devices, AudioDevice, DeviceEvent, DeviceInfo,
    DeviceNotifier, PlaySession, RecordFormat, RecordSession, SessionId,
};
pub use error::{DeviceError, DeviceFault, SessionError};
pub use host::CpalDevice;
pub use playback::{decode_wav, CpalPlayer, DecodedAudio};
pub use recording::{wav_spec, CpalRecorder};
