//! Filter — conjunctive log-line selection rules.
//!
//! Rules are written `key=value` and joined by commas, e.g.
//! `host=web01, top_date=2020-01-01, end_date=2020-01-31`.
//! Date bounds are half open: `top_*` is inclusive, `end_*` exclusive, and
//! `end_date` means the midnight after the given day.

use std::collections::HashSet;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use miner::crf::LabeledLine;
use miner::Tid;

use crate::error::{MeasureError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineFilter {
    pub host: Option<String>,
    pub area: Option<String>,
    pub top_dt: Option<NaiveDateTime>,
    pub end_dt: Option<NaiveDateTime>,
    pub ltid: Option<Tid>,
    pub ltgid: Option<usize>,
}

impl LineFilter {
    pub fn parse(rules: &str) -> Result<Self> {
        let mut filter = Self::default();
        for rule in rules.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let (key, value) = rule
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| MeasureError::InvalidRule(format!("missing '=' in {:?}", rule)))?;
            match key {
                "host" => set_once(&mut filter.host, key, value.to_string())?,
                "area" => set_once(&mut filter.area, key, value.to_string())?,
                "top_date" => set_once(&mut filter.top_dt, key, start_of(parse_date(value)?))?,
                "top_dt" => set_once(&mut filter.top_dt, key, parse_datetime(value)?)?,
                "end_date" => set_once(&mut filter.end_dt, key, start_of(parse_date(value)? + Duration::days(1)))?,
                "end_dt" => set_once(&mut filter.end_dt, key, parse_datetime(value)?)?,
                "date" => {
                    let day = parse_date(value)?;
                    set_once(&mut filter.top_dt, key, start_of(day))?;
                    set_once(&mut filter.end_dt, key, start_of(day + Duration::days(1)))?;
                }
                "ltid" => set_once(&mut filter.ltid, key, parse_id(key, value)?)?,
                "ltgid" | "gid" => set_once(&mut filter.ltgid, key, parse_id(key, value)?)?,
                other => return Err(MeasureError::InvalidRule(format!("unknown key {:?}", other))),
            }
        }
        Ok(filter)
    }

    /// `area_hosts` is the member set of `self.area`; `None` when no area
    /// applies or the area is `all`.
    pub fn matches(&self, line: &LabeledLine, area_hosts: Option<&HashSet<String>>) -> bool {
        if let Some(host) = &self.host {
            if line.host.as_deref() != Some(host.as_str()) {
                return false;
            }
        }
        if let Some(hosts) = area_hosts {
            match &line.host {
                Some(h) if hosts.contains(h) => {}
                _ => return false,
            }
        }
        if self.top_dt.is_some() || self.end_dt.is_some() {
            let Some(dt) = line.dt else {
                return false;
            };
            if self.top_dt.is_some_and(|top| dt < top) || self.end_dt.is_some_and(|end| dt >= end) {
                return false;
            }
        }
        if self.ltid.is_some() && line.tid != self.ltid {
            return false;
        }
        if self.ltgid.is_some() && line.gid != self.ltgid {
            return false;
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for LineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(host) = &self.host {
            parts.push(format!("host={}", host));
        }
        if let Some(area) = &self.area {
            parts.push(format!("area={}", area));
        }
        if let Some(top) = self.top_dt {
            parts.push(format!("top_dt={}", top.format(DATETIME_FORMAT)));
        }
        if let Some(end) = self.end_dt {
            parts.push(format!("end_dt={}", end.format(DATETIME_FORMAT)));
        }
        if let Some(ltid) = self.ltid {
            parts.push(format!("ltid={}", ltid));
        }
        if let Some(ltgid) = self.ltgid {
            parts.push(format!("ltgid={}", ltgid));
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(MeasureError::InvalidRule(format!("{} conflicts with an earlier bound", key)));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| MeasureError::InvalidRule(format!("bad date {:?}: {}", value, e)))
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|e| MeasureError::InvalidRule(format!("bad datetime {:?}: {}", value, e)))
}

fn parse_id(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| MeasureError::InvalidRule(format!("{} expects an integer, got {:?}", key, value)))
}

fn start_of(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}
