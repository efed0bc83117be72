//! Observable schema form state and the view that binds it to an engine.

pub mod error;
pub mod model;
pub mod view;

pub use error::{FormConfigError, ValidationError};
pub use model::{
    CustomValidator, ErrorTransformer, FormModel, FormOptions, ModelChange, RendererMap,
    UNSUPPORTED_KEYS,
};
pub use view::{ChangeEvent, FormEngine, FormProps, FormValue, FormView, IdAllocator};
