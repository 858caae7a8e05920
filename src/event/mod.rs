// Event Module - Presenter event dispatch
//
// Everything user-visible flows through one queue to the StatusPresenter

pub mod emitter;

pub use emitter::{start_emitter, Emitter, PresenterEvent, StatusPresenter};
