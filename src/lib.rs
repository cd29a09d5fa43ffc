//! Stockathon Ledger Library
//!
//! This library provides the trade-settlement core of the Stockathon stock
//! market simulation: investors, stocks, volume-driven pricing, atomic buy and
//! sell settlement and the append-only transaction log.

pub mod application;
pub mod config;
pub mod domain;
pub mod persistence;
