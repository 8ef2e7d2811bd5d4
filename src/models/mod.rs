pub mod black_scholes;
pub mod calibration;
pub mod normal;
pub mod volatility;
