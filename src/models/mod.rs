/// Регрессоры на ансамблях деревьев

pub mod binning;
pub mod tree;
pub mod oblivious;
pub mod ensemble;
pub mod family;

pub use ensemble::{TrainedModel, TreeEnsemble};
pub use family::{fit_ensemble, ModelFamily, ModelParams, ParamGrid};
