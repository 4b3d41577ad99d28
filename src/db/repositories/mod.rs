mod evaluations;
mod history;
mod meter_settings;
