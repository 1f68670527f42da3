//! Line-oriented EPANET INP file parser.
//!
//! Hand-rolled in the style of the other workspace crates (a `thiserror`
//! error enum, a builder threaded through one forward pass, `#[cfg(test)]
//! mod tests` per file) rather than reaching for an INI-parsing crate: each
//! section's fields have positional, type-varying meaning EPANET-specific
//! enough that a generic INI reader buys nothing over
//! `str::split_whitespace`.

use std::collections::HashMap;
use std::path::Path;

use hydro_network::{
    Comparator, ConditionalControl, Controls, LinkKind, NetworkBuilder, NetworkModel, PipeStatus,
    PumpMode, TimeAction, TimeControl, ValveKind,
};
use tracing::warn;

use crate::error::{InpError, InpResult};
use crate::units::{FlowUnit, UnitConverter};

/// Pressure-driven-demand parameters read from `[OPTIONS]`, applied
/// uniformly to every junction (EPANET has no per-junction override in the
/// INP format itself).
#[derive(Debug, Clone, Copy)]
pub struct PddOptions {
    pub p0_m: f64,
    pub pf_m: f64,
}

impl Default for PddOptions {
    // WNTR's own defaults: demand collapses to zero at the node's own
    // elevation, and is fully satisfied 0.1m above it. A network meant to
    // run in PDD mode is expected to override these via `MINIMUM PRESSURE`/
    // `REQUIRED PRESSURE`; this only keeps a DD-authored INP file from
    // dividing by a zero-width pressure band if it's ever run in PDD mode.
    fn default() -> Self {
        Self {
            p0_m: 0.0,
            pf_m: 0.1,
        }
    }
}

/// Everything extracted from one INP file: the built network plus the time
/// options a CLI may use as defaults when `--duration`/`--step` aren't
/// given explicitly.
#[derive(Debug, Clone)]
pub struct ParsedNetwork {
    pub network: NetworkModel,
    pub duration_s: Option<f64>,
    pub hydraulic_timestep_s: Option<f64>,
    pub pdd: PddOptions,
    /// Non-fatal issues: unsupported control lines, ignored options.
    pub warnings: Vec<String>,
}

struct Line {
    no: usize,
    text: String,
}

/// Split the raw file text into `section name -> ordered content lines`,
/// stripping `;`-comments and blank lines. Section headers are matched
/// case-insensitively and may carry trailing comment text.
fn split_sections(text: &str) -> HashMap<String, Vec<Line>> {
    let mut sections: HashMap<String, Vec<Line>> = HashMap::new();
    let mut current: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let no = idx + 1;
        let without_comment = match raw_line.find(';') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let trimmed = without_comment.trim();

        if trimmed.starts_with('[') {
            if let Some(end) = trimmed.find(']') {
                let header = trimmed[1..end].trim().to_ascii_uppercase();
                current = Some(header.clone());
                sections.entry(header).or_default();
                continue;
            }
        }

        if trimmed.is_empty() {
            continue;
        }

        if let Some(section) = &current {
            sections
                .entry(section.clone())
                .or_default()
                .push(Line {
                    no,
                    text: trimmed.to_string(),
                });
        }
    }

    sections
}

fn lines_of<'a>(sections: &'a HashMap<String, Vec<Line>>, name: &str) -> &'a [Line] {
    sections.get(name).map(|v| v.as_slice()).unwrap_or(&[])
}

fn parse_f64(path: &str, line: usize, what: &'static str, token: &str) -> InpResult<f64> {
    token.parse::<f64>().map_err(|_| InpError::Malformed {
        path: path.to_string(),
        line,
        what,
        text: token.to_string(),
    })
}

/// `hh:mm[:ss]` or a plain decimal-hours number, both of which appear in
/// EPANET's `[TIMES]` section, converted to seconds.
fn parse_clock_to_seconds(path: &str, line: usize, what: &'static str, token: &str) -> InpResult<f64> {
    if token.contains(':') {
        let parts: Vec<&str> = token.split(':').collect();
        let malformed = || InpError::Malformed {
            path: path.to_string(),
            line,
            what,
            text: token.to_string(),
        };
        let hours: f64 = parts.first().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
        let minutes: f64 = match parts.get(1) {
            Some(m) => m.parse().map_err(|_| malformed())?,
            None => 0.0,
        };
        let seconds: f64 = match parts.get(2) {
            Some(s) => s.parse().map_err(|_| malformed())?,
            None => 0.0,
        };
        Ok(hours * 3600.0 + minutes * 60.0 + seconds)
    } else {
        parse_f64(path, line, what, token).map(|hours| hours * 3600.0)
    }
}

#[derive(Debug, Default, Clone)]
struct Options {
    units: Option<FlowUnit>,
    headloss_warned: bool,
    pdd: PddOptions,
}

fn parse_options(path: &str, sections: &HashMap<String, Vec<Line>>, warnings: &mut Vec<String>) -> InpResult<Options> {
    let mut opts = Options::default();
    for l in lines_of(sections, "OPTIONS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let key = tokens[0].to_ascii_uppercase();
        match key.as_str() {
            "UNITS" => {
                let Some(unit_tok) = tokens.get(1) else {
                    continue;
                };
                opts.units = Some(FlowUnit::parse(path, l.no, unit_tok)?);
            }
            "HEADLOSS" => {
                if let Some(formula) = tokens.get(1) {
                    if !formula.eq_ignore_ascii_case("H-W") {
                        warnings.push(format!(
                            "{path}:{}: headloss formula {formula:?} is not supported (only Hazen-Williams); treating as H-W",
                            l.no
                        ));
                        opts.headloss_warned = true;
                    }
                }
            }
            "MINIMUM" if tokens.get(1).map(|t| t.eq_ignore_ascii_case("PRESSURE")).unwrap_or(false) => {
                if let Some(v) = tokens.get(2) {
                    opts.pdd.p0_m = parse_f64(path, l.no, "MINIMUM PRESSURE", v)?;
                }
            }
            "REQUIRED" if tokens.get(1).map(|t| t.eq_ignore_ascii_case("PRESSURE")).unwrap_or(false) => {
                if let Some(v) = tokens.get(2) {
                    opts.pdd.pf_m = parse_f64(path, l.no, "REQUIRED PRESSURE", v)?;
                }
            }
            _ => {}
        }
    }
    Ok(opts)
}

fn parse_times(path: &str, sections: &HashMap<String, Vec<Line>>) -> InpResult<(Option<f64>, Option<f64>, Option<f64>)> {
    let mut duration_s = None;
    let mut hydraulic_step_s = None;
    let mut pattern_step_s = None;

    for l in lines_of(sections, "TIMES") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let key0 = tokens[0].to_ascii_uppercase();
        match key0.as_str() {
            "DURATION" => {
                if let Some(v) = tokens.get(1) {
                    duration_s = Some(parse_clock_to_seconds(path, l.no, "DURATION", v)?);
                }
            }
            "HYDRAULIC" => {
                if let Some(v) = tokens.get(2) {
                    hydraulic_step_s = Some(parse_clock_to_seconds(path, l.no, "HYDRAULIC TIMESTEP", v)?);
                }
            }
            "PATTERN" if tokens.get(1).map(|t| t.eq_ignore_ascii_case("TIMESTEP")).unwrap_or(false) => {
                if let Some(v) = tokens.get(2) {
                    pattern_step_s = Some(parse_clock_to_seconds(path, l.no, "PATTERN TIMESTEP", v)?);
                }
            }
            _ => {}
        }
    }

    Ok((duration_s, hydraulic_step_s, pattern_step_s))
}

fn parse_patterns(sections: &HashMap<String, Vec<Line>>) -> HashMap<String, Vec<f64>> {
    let mut patterns: HashMap<String, Vec<f64>> = HashMap::new();
    for l in lines_of(sections, "PATTERNS") {
        let mut tokens = l.text.split_whitespace();
        let Some(name) = tokens.next() else { continue };
        let entry = patterns.entry(name.to_string()).or_default();
        for tok in tokens {
            if let Ok(v) = tok.parse::<f64>() {
                entry.push(v);
            }
        }
    }
    patterns
}

fn parse_curves(unit: UnitConverter, sections: &HashMap<String, Vec<Line>>) -> HashMap<String, Vec<(f64, f64)>> {
    let mut curves: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
    for l in lines_of(sections, "CURVES") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 3 {
            continue;
        }
        let (Ok(x), Ok(y)) = (tokens[1].parse::<f64>(), tokens[2].parse::<f64>()) else {
            continue;
        };
        curves
            .entry(tokens[0].to_string())
            .or_default()
            .push((unit.flow_to_cms(x), unit.length_to_m(y)));
    }
    curves
}

/// Parse an INP file's text into a built `NetworkModel` plus the time/PDD
/// options a caller may fall back on.
pub fn parse_str(path: &str, text: &str) -> InpResult<ParsedNetwork> {
    let sections = split_sections(text);
    let mut warnings = Vec::new();

    let options = parse_options(path, &sections, &mut warnings)?;
    let flow_unit = options.units.ok_or_else(|| InpError::MissingUnits { path: path.to_string() })?;
    let unit = UnitConverter::new(flow_unit);

    let (duration_s, hydraulic_timestep_s, pattern_step_s) = parse_times(path, &sections)?;

    let raw_patterns = parse_patterns(&sections);
    let raw_curves = parse_curves(unit, &sections);

    let mut builder = NetworkBuilder::new();
    builder.set_pattern_step_s(pattern_step_s.unwrap_or(3600.0));

    let mut pattern_ids = HashMap::new();
    for (name, mult) in &raw_patterns {
        pattern_ids.insert(name.clone(), builder.add_pattern(mult.clone()));
    }
    let mut curve_ids = HashMap::new();
    for (name, points) in &raw_curves {
        curve_ids.insert(name.clone(), builder.add_curve(points.clone()));
    }

    for l in lines_of(&sections, "JUNCTIONS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 2 {
            continue;
        }
        let name = tokens[0];
        let elev = unit.length_to_m(parse_f64(path, l.no, "junction elevation", tokens[1])?);
        let demand = match tokens.get(2) {
            Some(d) => unit.flow_to_cms(parse_f64(path, l.no, "junction base demand", d)?),
            None => 0.0,
        };
        let pattern = tokens.get(3).and_then(|p| pattern_ids.get(*p).copied());
        if tokens.get(3).is_some() && pattern.is_none() {
            warnings.push(format!(
                "{path}:{}: junction {name} references unknown pattern {:?}; ignoring",
                l.no, tokens[3]
            ));
        }
        builder.add_junction(name, elev, demand, pattern, options.pdd.p0_m, options.pdd.pf_m);
    }

    for l in lines_of(&sections, "RESERVOIRS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 2 {
            continue;
        }
        let name = tokens[0];
        let head = unit.length_to_m(parse_f64(path, l.no, "reservoir head", tokens[1])?);
        let pattern = tokens.get(2).and_then(|p| pattern_ids.get(*p).copied());
        builder.add_reservoir(name, head, pattern);
    }

    for l in lines_of(&sections, "TANKS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 7 {
            continue;
        }
        let name = tokens[0];
        let elev = unit.length_to_m(parse_f64(path, l.no, "tank elevation", tokens[1])?);
        let init_level = unit.length_to_m(parse_f64(path, l.no, "tank initial level", tokens[2])?);
        let min_level = unit.length_to_m(parse_f64(path, l.no, "tank min level", tokens[3])?);
        let max_level = unit.length_to_m(parse_f64(path, l.no, "tank max level", tokens[4])?);
        let diameter = unit.tank_diameter_to_m(parse_f64(path, l.no, "tank diameter", tokens[5])?);
        let min_vol = unit.volume_to_m3(parse_f64(path, l.no, "tank min volume", tokens[6])?);
        builder
            .add_tank(name, elev, init_level, min_level, max_level, diameter, min_vol)
            .map_err(InpError::from)?;
    }

    // NetworkBuilder assigns NodeIds in insertion order starting at 0, the
    // same order nodes were just added above (JUNCTIONS, RESERVOIRS,
    // TANKS); reconstruct that mapping directly rather than exposing a
    // by-name lookup on the builder itself.
    let mut node_names: HashMap<String, hydro_core::NodeId> = HashMap::new();
    let mut next_index = 0u32;
    for l in lines_of(&sections, "JUNCTIONS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 2 {
            continue;
        }
        node_names.insert(tokens[0].to_string(), hydro_core::Id::from_index(next_index));
        next_index += 1;
    }
    for l in lines_of(&sections, "RESERVOIRS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 2 {
            continue;
        }
        node_names.insert(tokens[0].to_string(), hydro_core::Id::from_index(next_index));
        next_index += 1;
    }
    for l in lines_of(&sections, "TANKS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 7 {
            continue;
        }
        node_names.insert(tokens[0].to_string(), hydro_core::Id::from_index(next_index));
        next_index += 1;
    }

    let lookup_node = |path: &str, line: usize, name: &str| -> InpResult<hydro_core::NodeId> {
        node_names.get(name).copied().ok_or_else(|| InpError::UnknownReference {
            path: path.to_string(),
            line,
            what: "node",
            name: name.to_string(),
        })
    };

    let mut link_names: Vec<String> = Vec::new();

    for l in lines_of(&sections, "PIPES") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 6 {
            continue;
        }
        let name = tokens[0];
        let from = lookup_node(path, l.no, tokens[1])?;
        let to = lookup_node(path, l.no, tokens[2])?;
        let length = unit.length_to_m(parse_f64(path, l.no, "pipe length", tokens[3])?);
        let diameter = unit.pipe_diameter_to_m(parse_f64(path, l.no, "pipe diameter", tokens[4])?);
        let roughness = parse_f64(path, l.no, "pipe roughness", tokens[5])?;
        let minor_loss = match tokens.get(6) {
            Some(m) => parse_f64(path, l.no, "pipe minor loss", m)?,
            None => 0.0,
        };
        let status = match tokens.get(7).map(|s| s.to_ascii_uppercase()) {
            Some(s) if s == "CLOSED" => PipeStatus::Closed,
            Some(s) if s == "CV" => PipeStatus::Cv,
            _ => PipeStatus::Open,
        };
        builder.add_pipe(name, from, to, length, diameter, roughness, minor_loss, status);
        link_names.push(name.to_string());
    }

    for l in lines_of(&sections, "PUMPS") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 3 {
            continue;
        }
        let name = tokens[0];
        let from = lookup_node(path, l.no, tokens[1])?;
        let to = lookup_node(path, l.no, tokens[2])?;

        let mut curve_name: Option<&str> = None;
        let mut power: Option<f64> = None;
        let mut i = 3;
        while i < tokens.len() {
            let key = tokens[i].to_ascii_uppercase();
            let Some(val) = tokens.get(i + 1) else { break };
            match key.as_str() {
                "HEAD" => curve_name = Some(val),
                "POWER" => power = Some(unit.power_to_w(parse_f64(path, l.no, "pump power", val)?)),
                _ => {}
            }
            i += 2;
        }

        let kind = if let Some(p) = power {
            LinkKind::Pump {
                mode: PumpMode::Power,
                curve: None,
                power_w: Some(p),
                base_status: PipeStatus::Open,
            }
        } else if let Some(cname) = curve_name {
            let curve = curve_ids.get(cname).copied().ok_or_else(|| InpError::UnknownReference {
                path: path.to_string(),
                line: l.no,
                what: "curve",
                name: cname.to_string(),
            })?;
            LinkKind::Pump {
                mode: PumpMode::Head,
                curve: Some(curve),
                power_w: None,
                base_status: PipeStatus::Open,
            }
        } else {
            return Err(InpError::Malformed {
                path: path.to_string(),
                line: l.no,
                what: "pump",
                text: "neither HEAD nor POWER keyword found".to_string(),
            });
        };

        builder.add_pump(name, from, to, kind).map_err(InpError::from)?;
        link_names.push(name.to_string());
    }

    for l in lines_of(&sections, "VALVES") {
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 6 {
            continue;
        }
        let name = tokens[0];
        let from = lookup_node(path, l.no, tokens[1])?;
        let to = lookup_node(path, l.no, tokens[2])?;
        let diameter = unit.pipe_diameter_to_m(parse_f64(path, l.no, "valve diameter", tokens[3])?);
        let kind = match tokens[4].to_ascii_uppercase().as_str() {
            "PRV" => ValveKind::Prv,
            "PSV" => ValveKind::Psv,
            "PBV" => ValveKind::Pbv,
            "FCV" => ValveKind::Fcv,
            "TCV" => ValveKind::Tcv,
            "GPV" => ValveKind::Gpv,
            other => {
                return Err(InpError::Malformed {
                    path: path.to_string(),
                    line: l.no,
                    what: "valve type",
                    text: other.to_string(),
                })
            }
        };
        let setting = match kind {
            ValveKind::Prv | ValveKind::Psv | ValveKind::Pbv => {
                unit.length_to_m(parse_f64(path, l.no, "valve setting", tokens[5])?)
            }
            ValveKind::Fcv => unit.flow_to_cms(parse_f64(path, l.no, "valve setting", tokens[5])?),
            ValveKind::Tcv => parse_f64(path, l.no, "valve setting", tokens[5])?,
            ValveKind::Gpv => {
                // GPV's 6th field is a head-loss curve name, not a number;
                // the solver has no GPV curve law, so the reference is
                // recorded as a warning and the valve gets a zero setting.
                warnings.push(format!(
                    "{path}:{}: GPV valve {name} head-loss curve {:?} is not supported; treating as a fixed zero-loss device",
                    l.no, tokens[5]
                ));
                0.0
            }
        };
        let minor_loss = match tokens.get(6) {
            Some(m) => parse_f64(path, l.no, "valve minor loss", m)?,
            None => 0.0,
        };
        let link_kind = LinkKind::Valve {
            diameter_m: diameter,
            kind,
            minor_loss_k: minor_loss,
            setting,
            base_status: PipeStatus::Open,
        };
        builder.add_valve(name, from, to, link_kind).map_err(InpError::from)?;
        link_names.push(name.to_string());
    }

    let link_ids: HashMap<String, hydro_core::LinkId> = link_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), hydro_core::Id::from_index(i as u32)))
        .collect();

    let mut controls = Controls::new();
    for l in lines_of(&sections, "CONTROLS") {
        let upper = l.text.to_ascii_uppercase();
        let tokens: Vec<&str> = l.text.split_whitespace().collect();
        if tokens.len() < 4 || !tokens[0].eq_ignore_ascii_case("LINK") {
            warnings.push(format!("{path}:{}: unsupported control line ignored: {:?}", l.no, l.text));
            continue;
        }
        let link_name = tokens[1];
        let Some(&link_id) = link_ids.get(link_name) else {
            warnings.push(format!(
                "{path}:{}: control references unknown link {link_name:?}; ignoring",
                l.no
            ));
            continue;
        };
        let action = match tokens[2].to_ascii_uppercase().as_str() {
            "OPEN" => TimeAction::Open,
            "CLOSED" => TimeAction::Closed,
            "ACTIVE" => TimeAction::Active,
            other => {
                warnings.push(format!("{path}:{}: unknown control action {other:?}; ignoring", l.no));
                continue;
            }
        };

        if upper.contains(" AT CLOCKTIME") {
            warnings.push(format!(
                "{path}:{}: AT CLOCKTIME controls are not supported (no wall-clock start reference); ignoring",
                l.no
            ));
            continue;
        }

        if let Some(at_pos) = tokens.iter().position(|t| t.eq_ignore_ascii_case("TIME")) {
            let Some(time_tok) = tokens.get(at_pos + 1) else {
                warnings.push(format!("{path}:{}: malformed AT TIME control; ignoring", l.no));
                continue;
            };
            let at_s = parse_clock_to_seconds(path, l.no, "control time", time_tok)?;
            controls.time_controls.push(TimeControl {
                link: link_id,
                at_s,
                action,
            });
        } else if let Some(if_pos) = tokens.iter().position(|t| t.eq_ignore_ascii_case("IF")) {
            let node_pos = if_pos + 2; // "IF NODE <name>"
            let Some(node_name) = tokens.get(node_pos) else {
                warnings.push(format!("{path}:{}: malformed IF NODE control; ignoring", l.no));
                continue;
            };
            let Some(&watch_node) = node_names.get(*node_name) else {
                warnings.push(format!(
                    "{path}:{}: control references unknown node {node_name:?}; ignoring",
                    l.no
                ));
                continue;
            };
            let Some(cmp_tok) = tokens.get(node_pos + 1) else {
                warnings.push(format!("{path}:{}: malformed IF NODE control; ignoring", l.no));
                continue;
            };
            let comparator = match cmp_tok.to_ascii_uppercase().as_str() {
                "ABOVE" => Comparator::Above,
                "BELOW" => Comparator::Below,
                other => {
                    warnings.push(format!("{path}:{}: unknown comparator {other:?}; ignoring", l.no));
                    continue;
                }
            };
            let Some(threshold_tok) = tokens.get(node_pos + 2) else {
                warnings.push(format!("{path}:{}: malformed IF NODE control; ignoring", l.no));
                continue;
            };
            let threshold_head_m = unit.length_to_m(parse_f64(path, l.no, "control threshold", threshold_tok)?);
            controls.conditional_controls.push(ConditionalControl {
                link: link_id,
                watch_node,
                comparator,
                threshold_head_m,
                action,
            });
        } else {
            warnings.push(format!("{path}:{}: unsupported control line ignored: {:?}", l.no, l.text));
        }
    }
    builder.set_controls(controls);

    let network = builder.build()?;

    Ok(ParsedNetwork {
        network,
        duration_s,
        hydraulic_timestep_s,
        pdd: options.pdd,
        warnings,
    })
}

/// Parse an INP file from disk.
pub fn parse_file(path: &Path) -> InpResult<ParsedNetwork> {
    let text = std::fs::read_to_string(path).map_err(|source| InpError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&path.display().to_string(), &text)
}
