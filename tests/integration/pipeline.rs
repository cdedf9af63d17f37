//! End-to-end pipeline tests: generate, settle and bankroll against an
//! in-memory workbook and the mock board.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

use propline::config::AppConfig;
use propline::engine::Pipeline;
use propline::storage::{Record, TabularStore, Workbook};
use propline::types::{BankrollEntry, Direction, PickStatus, SinglePick, TrackerError};

use crate::mock_board::{make_prop, FixedModel, MockBoard};

const SPORTS: [&str; 5] = ["Soccer", "NBA", "Baseball", "NFL", "NHL"];

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
}

fn make_pipeline(
    config: AppConfig,
    store: Workbook,
    board: &MockBoard,
    probabilities: Vec<f64>,
) -> Pipeline {
    Pipeline::new(
        config,
        Box::new(store),
        Box::new(board.clone()),
        Box::new(FixedModel::new(probabilities)),
    )
    .unwrap()
}

fn make_pick(player: &str, stake: Decimal) -> SinglePick {
    SinglePick {
        date: d(17),
        sport: "NBA".into(),
        player: player.into(),
        prop: "Points".into(),
        line: 10.5,
        direction: Direction::Over,
        probability: 0.7,
        units: dec!(1),
        stake,
        status: PickStatus::Unsettled,
        event: format!("evt-{player}"),
    }
}

/// A workbook holding a $100 balance on the 16th and the given picks on the 17th.
fn seeded_store(picks: &[SinglePick]) -> Workbook {
    let mut wb = Workbook::in_memory();
    wb.ensure_schema("Daily Picks", SinglePick::HEADER).unwrap();
    wb.ensure_schema("Bankroll", BankrollEntry::HEADER).unwrap();
    wb.append("Bankroll", BankrollEntry { date: d(16), balance: dec!(100) }.to_row())
        .unwrap();
    for pick in picks {
        wb.append("Daily Picks", pick.to_row()).unwrap();
    }
    wb
}

fn statuses(pipeline: &Pipeline) -> Vec<String> {
    pipeline
        .store()
        .read("Daily Picks")
        .unwrap()
        .iter()
        .map(|row| row["Status"].clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_end_to_end_five_sports() {
    let board = MockBoard::one_per_sport(&SPORTS);
    let probabilities = vec![0.9, 0.75, 0.65, 0.55, 0.82];
    let mut pipeline =
        make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, probabilities.clone());

    let report = pipeline.generate(d(17)).await.unwrap();

    let units: Vec<Decimal> = report.picks.iter().map(|p| p.units).collect();
    assert_eq!(units, vec![dec!(2), dec!(1), dec!(0.5), dec!(0.25), dec!(2)]);
    // $20 seed × 5% per unit
    assert_eq!(report.picks[0].stake, dec!(2.00));
    assert_eq!(report.picks[3].stake, dec!(0.25));

    let parlays: Vec<_> = report.combinations.iter().filter(|c| c.kind == "Parlay").collect();
    let moonshots: Vec<_> = report.combinations.iter().filter(|c| c.kind == "Moonshot").collect();
    assert_eq!(parlays.len(), 10);
    assert_eq!(moonshots.len(), 5);

    // Sports walk in lexicographic order: Baseball, NBA, NFL, NHL, Soccer.
    assert_eq!(
        parlays[0].legs,
        vec![
            "Baseball Player Points O10.5",
            "NBA Player Points O10.5",
            "NFL Player Points O10.5",
        ]
    );
    assert_eq!(parlays[0].payout, dec!(3.7));
    assert!(parlays[9].legs[0].starts_with("NFL"));

    // A fresh run over the same board gives the same order.
    let mut again =
        make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, probabilities);
    let second = again.generate(d(17)).await.unwrap();
    assert_eq!(second.combinations, report.combinations);
}

#[tokio::test]
async fn test_regenerate_replaces_same_day_rows() {
    let board = MockBoard::one_per_sport(&SPORTS);
    let mut pipeline = make_pipeline(
        AppConfig::default(),
        Workbook::in_memory(),
        &board,
        vec![0.9, 0.75, 0.65, 0.55, 0.82],
    );

    pipeline.generate(d(17)).await.unwrap();
    let picks_first = pipeline.store().read("Daily Picks").unwrap();
    let combos_first = pipeline.store().read("MultiSport Picks").unwrap();

    pipeline.generate(d(17)).await.unwrap();
    assert_eq!(pipeline.store().read("Daily Picks").unwrap(), picks_first);
    assert_eq!(pipeline.store().read("MultiSport Picks").unwrap(), combos_first);

    // The log is append-only: one row per pick and combination per run.
    assert_eq!(pipeline.store().read("Log").unwrap().len(), 40);
}

#[tokio::test]
async fn test_regenerate_without_combos_clears_old_combos() {
    let mut path = std::env::temp_dir();
    path.push(format!("propline_it_{}.json", uuid::Uuid::new_v4()));
    let board = MockBoard::one_per_sport(&SPORTS);
    for s in SPORTS {
        board.set_outcome(&format!("{s} Player"), 20.0);
    }

    {
        let mut pipeline =
            make_pipeline(AppConfig::default(), Workbook::open(&path).unwrap(), &board, vec![0.7]);
        let report = pipeline.generate(d(17)).await.unwrap();
        assert_eq!(report.combinations.len(), 15);
    }

    let mut config = AppConfig::default();
    config.combos.enabled = false;
    let mut pipeline = make_pipeline(config, Workbook::open(&path).unwrap(), &board, vec![0.7]);
    let report = pipeline.generate(d(17)).await.unwrap();
    assert!(report.combinations.is_empty());
    assert!(pipeline.store().read("MultiSport Picks").unwrap().is_empty());

    let settled = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(settled.combos_settled, 0);
    assert_eq!(settled.hits, 5);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_board_failure_leaves_other_dates_alone() {
    let board = MockBoard::one_per_sport(&SPORTS);
    let mut pipeline =
        make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, vec![0.7]);

    pipeline.generate(d(16)).await.unwrap();
    let before = pipeline.store().read("Daily Picks").unwrap();

    board.set_error("503 Service Unavailable");
    let err = pipeline.generate(d(17)).await.unwrap_err();
    let tracker_err = err.downcast_ref::<TrackerError>().unwrap();
    assert!(matches!(tracker_err, TrackerError::UpstreamUnavailable(_)));
    assert!(tracker_err.is_retryable());

    assert_eq!(pipeline.store().read("Daily Picks").unwrap(), before);

    board.clear_error();
    pipeline.generate(d(17)).await.unwrap();
    assert_eq!(pipeline.store().read("Daily Picks").unwrap().len(), 10);
}

#[tokio::test]
async fn test_sport_tags_are_normalised() {
    let board = MockBoard::new(vec![
        make_prop(" nba ", "A", 10.5),
        make_prop("NBA", "B", 10.5),
        make_prop("table tennis", "C", 10.5),
        make_prop("", "Nobody", 10.5),
    ]);
    let mut pipeline =
        make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, vec![0.7]);

    let report = pipeline.generate(d(17)).await.unwrap();
    let sports: Vec<&str> = report.picks.iter().map(|p| p.sport.as_str()).collect();
    assert_eq!(sports, vec!["NBA", "NBA", "Table Tennis"]);
    assert_eq!(report.rejected, 1);
}

// ---------------------------------------------------------------------------
// Settle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_settle_over_line_and_rerun() {
    let board = MockBoard::new(vec![
        make_prop("NBA", "Hit Guy", 10.5),
        make_prop("NBA", "Miss Guy", 10.5),
        make_prop("NBA", "Bench Guy", 10.5),
    ]);
    board.set_outcome("Hit Guy", 11.0);
    board.set_outcome("Miss Guy", 10.0);
    let mut pipeline =
        make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, vec![0.7]);

    pipeline.generate(d(17)).await.unwrap();
    let report = pipeline.settle(d(17)).await.unwrap();
    assert_eq!((report.hits, report.misses, report.dnps), (1, 1, 1));
    assert_eq!(statuses(&pipeline), vec!["Hit", "Miss", "DNP"]);
    assert_eq!(board.lookup_count(), 3);

    // Terminal picks are not looked up or changed again.
    board.set_outcome("Miss Guy", 30.0);
    let again = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(again.already_settled, 3);
    assert_eq!(board.lookup_count(), 3);
    assert_eq!(statuses(&pipeline), vec!["Hit", "Miss", "DNP"]);
    assert_eq!(again.balance_after, report.balance_after);
}

#[tokio::test]
async fn test_bankroll_hit_and_miss_applied_once() {
    let picks = vec![make_pick("Hit Guy", dec!(5)), make_pick("Miss Guy", dec!(3))];
    let board = MockBoard::new(Vec::new());
    board.set_outcome("Hit Guy", 12.0);
    board.set_outcome("Miss Guy", 4.0);
    let mut pipeline = make_pipeline(AppConfig::default(), seeded_store(&picks), &board, vec![]);

    let first = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(first.balance_before, dec!(100));
    assert_eq!(first.balance_after, dec!(102));

    let second = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(second.balance_after, dec!(102));
    assert_eq!(pipeline.current_balance(d(17)).unwrap(), dec!(102));
    assert_eq!(pipeline.current_balance(d(30)).unwrap(), dec!(102));
    assert_eq!(pipeline.store().read("Bankroll").unwrap().len(), 2);
}

#[tokio::test]
async fn test_lookup_failure_leaves_pick_open_until_next_run() {
    let picks = vec![make_pick("Hit Guy", dec!(5)), make_pick("Flaky Guy", dec!(3))];
    let board = MockBoard::new(Vec::new());
    board.set_outcome("Hit Guy", 12.0);
    board.set_outcome("Flaky Guy", 4.0);
    board.fail_lookup("Flaky Guy");
    let mut pipeline = make_pipeline(AppConfig::default(), seeded_store(&picks), &board, vec![]);

    let first = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(first.lookup_failures, 1);
    assert!(first.needs_retry());
    assert_eq!(statuses(&pipeline), vec!["Hit", ""]);
    assert_eq!(first.balance_after, dec!(105));

    board.clear_lookup_failures();
    let second = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(second.lookup_failures, 0);
    assert_eq!(statuses(&pipeline), vec!["Hit", "Miss"]);
    assert_eq!(second.balance_after, dec!(102));
}

#[tokio::test]
async fn test_late_settlement_rolls_later_balances_forward() {
    let mut next_day = make_pick("Hit Guy", dec!(5));
    next_day.date = d(18);
    let picks = vec![make_pick("Flaky Guy", dec!(3)), next_day];
    let board = MockBoard::new(Vec::new());
    board.set_outcome("Flaky Guy", 4.0);
    board.set_outcome("Hit Guy", 12.0);
    board.fail_lookup("Flaky Guy");
    let mut pipeline = make_pipeline(AppConfig::default(), seeded_store(&picks), &board, vec![]);

    let first = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(first.balance_after, dec!(100));
    let next = pipeline.settle(d(18)).await.unwrap();
    assert_eq!(next.balance_after, dec!(105));

    board.clear_lookup_failures();
    let retry = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(retry.misses, 1);
    assert_eq!(retry.balance_after, dec!(97));

    assert_eq!(pipeline.current_balance(d(18)).unwrap(), dec!(102));
    assert_eq!(pipeline.current_balance(d(30)).unwrap(), dec!(102));
    assert_eq!(pipeline.store().read("Bankroll").unwrap().len(), 3);

    // Re-settling the later day keeps its own delta on the new base.
    let again = pipeline.settle(d(18)).await.unwrap();
    assert_eq!(again.balance_before, dec!(97));
    assert_eq!(again.balance_after, dec!(102));
}

#[tokio::test]
async fn test_slow_lookup_times_out() {
    let mut config = AppConfig::default();
    config.settlement.lookup_timeout_secs = 1;
    let board = MockBoard::new(Vec::new());
    board.set_outcome("Slow Guy", 12.0);
    board.set_lookup_delay(Duration::from_millis(1500));
    let mut pipeline =
        make_pipeline(config, seeded_store(&[make_pick("Slow Guy", dec!(5))]), &board, vec![]);

    let report = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(report.lookup_failures, 1);
    assert_eq!(statuses(&pipeline), vec![""]);
    assert_eq!(report.balance_after, dec!(100));
}

#[tokio::test]
async fn test_unavailable_outcome_is_dnp() {
    let board = MockBoard::new(Vec::new());
    let mut pipeline = make_pipeline(
        AppConfig::default(),
        seeded_store(&[make_pick("Scratched Player", dec!(5))]),
        &board,
        vec![],
    );

    let report = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(report.dnps, 1);
    assert_eq!(report.lookup_failures, 0);
    assert_eq!(statuses(&pipeline), vec!["DNP"]);
    assert_eq!(report.balance_after, dec!(100));
}

#[tokio::test]
async fn test_invalid_rows_are_kept_verbatim() {
    let mut store = seeded_store(&[make_pick("Hit Guy", dec!(5))]);
    let mut broken = make_pick("Broken Guy", dec!(3)).to_row();
    broken.insert("Probability".into(), "sure thing".into());
    store.append("Daily Picks", broken.clone()).unwrap();

    let board = MockBoard::new(Vec::new());
    board.set_outcome("Hit Guy", 12.0);
    board.set_outcome("Broken Guy", 12.0);
    let mut pipeline = make_pipeline(AppConfig::default(), store, &board, vec![]);

    let report = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(report.hits, 1);
    assert_eq!(report.balance_after, dec!(105));

    let rows = pipeline.store().read("Daily Picks").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&broken));
}

#[tokio::test]
async fn test_combinations_settle_with_their_legs() {
    let board = MockBoard::one_per_sport(&["NBA", "NFL", "NHL"]);
    board.set_outcome("NBA Player", 20.0);
    board.set_outcome("NFL Player", 20.0);
    board.set_outcome("NHL Player", 20.0);
    let mut pipeline =
        make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, vec![0.7]);

    let generated = pipeline.generate(d(17)).await.unwrap();
    assert_eq!(generated.combinations.len(), 1);
    let parlay_stake = generated.combinations[0].stake;

    let report = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(report.combos_settled, 1);
    // Three $1.00 singles plus the parlay, all hit.
    assert_eq!(report.delta, dec!(3) + parlay_stake);
    let combos = pipeline.store().read("MultiSport Picks").unwrap();
    assert_eq!(combos[0]["Status"], "Hit");
}

// ---------------------------------------------------------------------------
// Persistence and diagnostics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_workbook_file_survives_restart() {
    let mut path = std::env::temp_dir();
    path.push(format!("propline_it_{}.json", uuid::Uuid::new_v4()));

    let board = MockBoard::one_per_sport(&SPORTS);
    for s in SPORTS {
        board.set_outcome(&format!("{s} Player"), 20.0);
    }

    {
        let mut pipeline =
            make_pipeline(AppConfig::default(), Workbook::open(&path).unwrap(), &board, vec![0.7]);
        pipeline.generate(d(17)).await.unwrap();
    }

    let mut pipeline =
        make_pipeline(AppConfig::default(), Workbook::open(&path).unwrap(), &board, vec![0.7]);
    let report = pipeline.settle(d(17)).await.unwrap();
    assert_eq!(report.hits, 5);
    assert!(report.balance_after > dec!(20));

    let reopened = Workbook::open(&path).unwrap();
    assert_eq!(reopened.read("Bankroll").unwrap().len(), 1);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_diagnostics_reports_external_balance() {
    let board = MockBoard::one_per_sport(&SPORTS);
    let pipeline = make_pipeline(AppConfig::default(), Workbook::in_memory(), &board, vec![0.7]);

    let diag = pipeline.diagnostics().await;
    assert_eq!(diag.provider, "mock");
    assert_eq!(diag.external_balance, Ok(dec!(42.50)));
    assert_eq!(diag.board_size, Ok(5));
    assert_eq!(diag.board_sample.len(), 3);

    board.set_error("board down");
    let diag = pipeline.diagnostics().await;
    assert!(diag.board_size.is_err());
    assert!(diag.board_sample.is_empty());
}
