//! CLI command handlers.

pub mod archive;
pub mod config;
pub mod controller;
pub mod evidence;
pub mod queue;
pub mod run;

use anyhow::anyhow;

use crate::domain::models::gate::GateProfileName;
use crate::domain::models::kpi::{TrendMode, TrendPeriod};
use crate::domain::models::session::SessionKind;

pub fn parse_gate_profile(raw: &str) -> anyhow::Result<GateProfileName> {
    match raw.to_lowercase().as_str() {
        "default" => Ok(GateProfileName::Default),
        "dev" => Ok(GateProfileName::Dev),
        "staging" => Ok(GateProfileName::Staging),
        "prod" => Ok(GateProfileName::Prod),
        other => Err(anyhow!("unknown gate profile '{other}', expected default|dev|staging|prod")),
    }
}

pub fn parse_session_kind(raw: &str) -> anyhow::Result<SessionKind> {
    match raw.to_lowercase().as_str() {
        "close-loop" | "close_loop" => Ok(SessionKind::CloseLoop),
        "batch" => Ok(SessionKind::Batch),
        "controller" => Ok(SessionKind::Controller),
        "governance" => Ok(SessionKind::Governance),
        other => Err(anyhow!("unknown archive kind '{other}', expected close-loop|batch|controller|governance")),
    }
}

pub fn parse_trend_period(raw: &str) -> anyhow::Result<TrendPeriod> {
    match raw.to_lowercase().as_str() {
        "week" => Ok(TrendPeriod::Week),
        "day" => Ok(TrendPeriod::Day),
        other => Err(anyhow!("unknown trend period '{other}', expected week|day")),
    }
}

pub fn parse_trend_mode(raw: &str) -> anyhow::Result<TrendMode> {
    match raw.to_lowercase().as_str() {
        "all" => Ok(TrendMode::All),
        "batch" => Ok(TrendMode::Batch),
        "program" => Ok(TrendMode::Program),
        "recover" => Ok(TrendMode::Recover),
        "controller" => Ok(TrendMode::Controller),
        other => Err(anyhow!("unknown trend mode '{other}', expected all|batch|program|recover|controller")),
    }
}
