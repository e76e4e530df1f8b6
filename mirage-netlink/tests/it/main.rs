mod attributes;
mod engine;
mod kernel;
mod socket;
