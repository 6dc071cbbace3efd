mod common;

use common::{FailingSource, FakeRenderer, FixedConcerned, Harness};
use covgate::error::CovgateError;
use covgate::links::StaticLink;
use covgate::model::ChangeKind;
use covgate::presubmit::Outcome;
use covgate::report::EMPTY_REPORT;

fn checked(outcome: Outcome) -> (covgate::model::ChangeSet, covgate::report::RenderedReport, bool) {
    match outcome {
        Outcome::Checked {
            changes,
            report,
            commented,
        } => (changes, report, commented),
        Outcome::NothingToCheck => panic!("expected a checked outcome"),
    }
}

#[test]
fn improved_file_passes_at_threshold() {
    let h = Harness::new(
        70.0,
        common::profile(&[("a.go", 8, 10), ("b.go", 5, 10)]),
        common::profile(&[("a.go", 9, 10), ("b.go", 5, 10)]),
    );

    let outcome = h.presubmit().run().unwrap();
    assert!(!outcome.is_coverage_low());

    let (changes, report, commented) = checked(outcome);
    assert!((changes.base_ratio - 0.65).abs() < 1e-9);
    assert!((changes.new_ratio - 0.70).abs() < 1e-9);
    assert!((changes.delta() - 0.05).abs() < 1e-9);
    assert_eq!(changes.get("a.go").unwrap().kind, ChangeKind::Improved);
    assert_eq!(changes.get("b.go").unwrap().kind, ChangeKind::Unchanged);
    assert!(!report.is_empty);
    assert!(commented);
    assert_eq!(h.archive.written.borrow().len(), 1);
    assert_eq!(h.comments.posted.borrow()[0], report.content);
}

#[test]
fn new_file_is_reported() {
    let mut h = Harness::new(
        70.0,
        common::profile(&[("a.go", 8, 10)]),
        common::profile(&[("a.go", 8, 10), ("c.go", 0, 5)]),
    );
    h.concerned = Some(FixedConcerned(vec!["c.go"]));

    let (changes, report, _) = checked(h.presubmit().run().unwrap());

    assert_eq!(changes.changes.len(), 1);
    assert_eq!(changes.changes[0].path, "c.go");
    assert_eq!(changes.changes[0].kind, ChangeKind::Added);
    assert!(!report.is_empty);
    assert!(report.content.contains("| `c.go` | — | 0.0% | — | new |"));
}

#[test]
fn untouched_concerned_file_is_empty_report() {
    let mut h = Harness::new(
        70.0,
        common::profile(&[("a.go", 1, 10)]),
        common::profile(&[("a.go", 1, 10)]),
    );
    h.concerned = Some(FixedConcerned(vec!["z.go"]));

    let outcome = h.presubmit().run().unwrap();
    assert!(!outcome.is_coverage_low());

    let (_, report, commented) = checked(outcome);
    assert!(report.is_empty);
    assert!(!report.is_low);
    assert!(report.content.contains(EMPTY_REPORT));
    assert!(!commented);
    assert!(h.comments.posted.borrow().is_empty());
    // The empty report is still archived.
    assert_eq!(h.archive.written.borrow().len(), 1);
}

#[test]
fn malformed_new_profile_is_fatal() {
    let h = Harness::new(
        70.0,
        common::profile(&[("a.go", 1, 10)]),
        b"mode: set\nthis is not coverage\n".to_vec(),
    );

    let err = h.presubmit().run().unwrap_err();

    assert!(err.is_profile_parse());
    assert!(h.archive.written.borrow().is_empty());
    assert!(h.comments.posted.borrow().is_empty());
}

#[test]
fn malformed_base_profile_is_fatal() {
    let h = Harness::new(70.0, b"".to_vec(), common::profile(&[("a.go", 1, 10)]));

    let err = h.presubmit().run().unwrap_err();

    assert!(matches!(err, CovgateError::EmptyProfile));
    assert!(h.archive.written.borrow().is_empty());
}

#[test]
fn unavailable_baseline_is_fatal() {
    let h = Harness::new(70.0, Vec::new(), common::profile(&[("a.go", 1, 10)]));
    let mut presubmit = h.presubmit();
    presubmit.base_profile = &FailingSource;

    let err = presubmit.run().unwrap_err();

    assert!(matches!(err, CovgateError::Fetch(_)));
    assert!(h.archive.written.borrow().is_empty());
}

#[test]
fn empty_concerned_set_short_circuits() {
    let mut h = Harness::new(70.0, Vec::new(), b"garbage".to_vec());
    h.concerned = Some(FixedConcerned(Vec::new()));

    // Neither profile is read, so the bad bytes never matter.
    let outcome = h.presubmit().run().unwrap();

    assert!(matches!(outcome, Outcome::NothingToCheck));
    assert!(!outcome.is_coverage_low());
    assert!(h.archive.written.borrow().is_empty());
}

#[test]
fn links_follow_report_order() {
    let mut h = Harness::new(
        50.0,
        common::profile(&[("good.go", 9, 10), ("bad.go", 6, 10)]),
        common::profile(&[("good.go", 9, 10), ("bad.go", 6, 10)]),
    );
    h.renderer = Some(FakeRenderer::new(false));
    h.links = Some(StaticLink("https://store/cov.html".to_string()));

    let (changes, report, _) = checked(h.presubmit().run().unwrap());

    assert_eq!(changes.changes[0].path, "bad.go");
    assert_eq!(
        changes.changes[0].line_cov_link.as_deref(),
        Some("https://store/cov.html#file0")
    );
    assert_eq!(
        changes.changes[1].line_cov_link.as_deref(),
        Some("https://store/cov.html#file1")
    );
    assert!(report
        .content
        .contains("[`bad.go`](https://store/cov.html#file0)"));
}

#[test]
fn failed_render_drops_links_but_keeps_verdict() {
    let mut h = Harness::new(
        70.0,
        common::profile(&[("a.go", 9, 10)]),
        common::profile(&[("a.go", 1, 10)]),
    );
    h.renderer = Some(FakeRenderer::new(true));
    h.links = Some(StaticLink("https://store/cov.html".to_string()));

    let outcome = h.presubmit().run().unwrap();
    assert!(outcome.is_coverage_low());

    let (changes, report, _) = checked(outcome);
    assert_eq!(changes.get("a.go").unwrap().kind, ChangeKind::Regressed);
    assert!(changes.changes.iter().all(|c| c.line_cov_link.is_none()));
    assert!(report.content.contains("| `a.go` |"));
}

#[test]
fn deleted_file_shows_as_removed() {
    let mut h = Harness::new(
        50.0,
        common::profile(&[("a.go", 5, 10), ("old.go", 3, 4)]),
        common::profile(&[("a.go", 6, 10)]),
    );
    h.concerned = Some(FixedConcerned(vec!["a.go", "old.go"]));

    let (changes, report, _) = checked(h.presubmit().run().unwrap());

    assert_eq!(changes.get("old.go").unwrap().kind, ChangeKind::Removed);
    assert!(report.content.contains("| `old.go` | 75.0% | — | — | removed |"));
}

#[test]
fn line_coverage_page_only_lists_concerned_files() {
    let mut h = Harness::new(
        50.0,
        common::profile(&[("a.go", 5, 10), ("b.go", 5, 10)]),
        common::profile(&[("a.go", 6, 10), ("b.go", 5, 10), ("c.go", 1, 10)]),
    );
    h.concerned = Some(FixedConcerned(vec!["c.go", "a.go"]));
    h.renderer = Some(FakeRenderer::new(false));
    h.links = Some(StaticLink("https://store/cov.html".to_string()));

    let (changes, _, _) = checked(h.presubmit().run().unwrap());

    let rendered = h.renderer.as_ref().unwrap().rendered.borrow().clone().unwrap();
    let rendered = String::from_utf8(rendered).unwrap();
    assert!(rendered.starts_with("mode: set\n"));
    assert!(rendered.contains("a.go:"));
    assert!(rendered.contains("c.go:"));
    assert!(!rendered.contains("b.go:"));

    // Anchors index the filtered page: c.go is worst, then a.go.
    assert_eq!(changes.changes[0].path, "c.go");
    assert_eq!(
        changes.changes[0].line_cov_link.as_deref(),
        Some("https://store/cov.html#file0")
    );
    assert_eq!(
        changes.get("a.go").unwrap().line_cov_link.as_deref(),
        Some("https://store/cov.html#file1")
    );
}

#[test]
fn coverage_at_fractional_threshold_passes() {
    let h = Harness::new(
        69.9,
        common::profile(&[("a.go", 699, 1000)]),
        common::profile(&[("a.go", 699, 1000)]),
    );

    let outcome = h.presubmit().run().unwrap();

    assert!(!outcome.is_coverage_low());
}

#[test]
fn overflowing_statement_counts_are_rejected() {
    let h = Harness::new(
        50.0,
        common::profile(&[("a.go", 1, 10)]),
        format!(
            "mode: set\na.go:1.1,2.1 {} 1\nb.go:1.1,2.1 1 1\n",
            u64::MAX
        )
        .into_bytes(),
    );

    let err = h.presubmit().run().unwrap_err();

    assert!(err.is_profile_parse());
    assert!(h.archive.written.borrow().is_empty());
}
