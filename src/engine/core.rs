mod error;
mod options;
mod preset;
pub mod query;
mod session;
mod settings;
mod x264;

pub use error::{CatalogError, ParseError, SupervisorError};
pub use options::{AdvancedOptionSet, OptionEntry, OptionKey};
pub use preset::{DEFAULT_PRESET_NAME, Preset, PresetCatalog, PresetStore};
pub use query::{decode as decode_query, encode as encode_query};
pub use session::{initial_config, save_user_defaults};
pub use settings::{
    Anamorphic, AudioEncoder, AudioTrack, ChapterRange, Container, CropBox, EncodeConfig,
    Framerate, MAX_AUDIO_TRACKS, Mixdown, RateControl, SampleRate, SubtitleSelection, VideoCodec,
    apply_audio_cascade, apply_chapter_marker_extension, apply_track_cascade, apply_video_cascade,
    normalize,
};
pub use x264::{Analyse, Deblock, DirectMode, MotionEstimation, OptionEditor, X264Settings};
