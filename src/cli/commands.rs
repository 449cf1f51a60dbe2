use std::path::Path;

use serde::Serialize;

use crate::ability::AbilityId;
use crate::board::SpeciesCatalog;
use crate::config::{ForecastConfig, Scenario};
use crate::forecast::{ForecastInput, Forecaster, TrialResult};

/// JSON form of one ranked move, with the board spelled out in species names.
#[derive(Serialize)]
struct ReportEntry<'a> {
    rank: usize,
    #[serde(flatten)]
    result: &'a TrialResult,
    board_rows: Vec<String>,
}

/// Forecast every candidate move of a scenario and print them best first.
pub fn run_forecast(
    config: &ForecastConfig,
    scenario_path: &Path,
    json: bool,
    top: Option<usize>,
) -> Result<(), String> {
    let scenario = Scenario::from_file(scenario_path, config.ability_threshold)?;
    let catalog = scenario.catalog.clone();
    let input = ForecastInput::from(scenario);

    let forecaster = Forecaster::new(config.clone())?;
    let mut results = forecaster
        .compute(&input)
        .ok_or_else(|| "Forecast was superseded before it finished".to_string())?;
    Forecaster::rank(&mut results);
    if let Some(n) = top {
        results.truncate(n);
    }

    if json {
        println!("{}", render_json(&results, &catalog)?);
    } else {
        print!("{}", render_table(&results, &catalog));
    }
    Ok(())
}

pub fn render_json(results: &[TrialResult], catalog: &SpeciesCatalog) -> Result<String, String> {
    let report: Vec<ReportEntry<'_>> = results
        .iter()
        .enumerate()
        .map(|(i, result)| ReportEntry {
            rank: i + 1,
            result,
            board_rows: result.board.render(catalog).lines().map(str::to_string).collect(),
        })
        .collect();
    serde_json::to_string_pretty(&report).map_err(|e| format!("Cannot encode report: {}", e))
}

pub fn render_table(results: &[TrialResult], catalog: &SpeciesCatalog) -> String {
    if results.is_empty() {
        return "No move produced a forecast\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<16} {:>10} {:>10} {:>8} {:>8} {:>8} {:>7}\n",
        "#", "Move", "Score", "±", "Coins", "Blocks", "Combos", "Trials"
    ));
    out.push_str(&format!("{}\n", "-".repeat(78)));
    for (i, r) in results.iter().enumerate() {
        let mv = r.mv.map_or_else(|| "(none)".to_string(), |m| m.to_string());
        out.push_str(&format!(
            "{:<4} {:<16} {:>10.1} {:>10.1} {:>8.1} {:>8.2} {:>8.2} {:>7}\n",
            i + 1,
            mv,
            r.score.mean,
            r.score.std_dev,
            r.currency.mean,
            r.blocks_cleared.mean,
            r.combos.mean,
            r.trials
        ));
    }

    let best = &results[0];
    out.push_str("\nMost likely board after the best move:\n");
    out.push_str(&best.board.render(catalog));
    if best.truncated > 0 {
        out.push_str(&format!(
            "\n{} of {} trials hit the iteration cap\n",
            best.truncated, best.trials
        ));
    }
    out
}

/// Print the ability catalog with activation odds per match size.
pub fn list_abilities() {
    println!(
        "{:<24} {:>4} {:>4} {:>4} {:>4}  {}",
        "Ability", "3", "4", "5", "6+", "Kind"
    );
    println!("{}", "-".repeat(52));
    for &id in AbilityId::all().iter().filter(|id| !id.is_sentinel()) {
        let def = id.def();
        let kind = if def.persistent {
            "alternate form"
        } else if def.extra_blocks.is_some() || def.plan.is_some() {
            "progressive"
        } else if def.score_multiplier.is_some() {
            "attack"
        } else {
            "effect"
        };
        println!(
            "{:<24} {:>4} {:>4} {:>4} {:>4}  {}",
            id.to_string(),
            def.odds[0],
            def.odds[1],
            def.odds[2],
            def.odds[3],
            kind
        );
    }
}
