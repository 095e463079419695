pub mod loop_controller;
pub mod translator;

pub use self::loop_controller::{LoopController, LoopFrame};
pub use self::translator::InstructionTranslator;
