//! State machines for inputs, buttons, and outputs, plus the timers and
//! expander bookkeeping they share.

pub mod button;
pub mod debounce;
pub mod expander;
pub mod input;
pub mod output;
pub mod timer;
