//! # ag-metrics
//!
//! Goodness-of-fit metrics used as calibration objectives: error magnitudes
//! (RMSE, MAE, MSE, RRMSE), bias, and agreement indices (modelling
//! efficiency, Willmott's index, R², regression slope, Lin's CCC).
//!
//! Every metric takes the reference series first and the predicted series
//! second, and reports its textbook value via [`Metric::evaluate`]. For
//! objective wiring, [`Metric::loss`] orients every metric so that lower is
//! better.

mod fit;
mod stats;

pub use fit::{
    bias, ccc, ccc_with_ci, mae, modelling_efficiency, mse, r2, rmse, rrmse, slope, wia, Better,
    CccEstimate, Metric,
};
