#![forbid(unsafe_code)]

pub mod assets;
pub mod clock;
pub mod composite;
pub mod core;
pub mod error;
pub mod feed;
pub mod frame;
pub mod fx;
pub mod generators;
pub mod mixbus;
pub mod players;
pub mod session;
pub mod source;
pub mod stinger;
pub mod studio;

pub use clock::{FrameClock, SubscriptionId, TickPhase, TickSubscriber};
pub use composite::WipeDirection;
pub use core::{MixConfig, Tick, TickRate};
pub use error::{MixError, MixResult};
pub use feed::{FeedSource, FrameFeed};
pub use frame::{Frame, Matte};
pub use fx::{EffectSettings, FlipMode, FxChain};
pub use mixbus::{MixBus, MixEvent, MixEventKind, MixOutput, TransitionKind};
pub use session::SessionSpec;
pub use source::{Source, SourceHandle, SourceId, SourceRegistry};
pub use stinger::{StingerCue, StingerSequence};
pub use studio::{BusSlot, ControlCommand, Studio};
