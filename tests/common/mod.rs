#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use covgate::calc::{ConcernedFileSource, ConcernedFiles};
use covgate::config::GateConfig;
use covgate::error::{CovgateError, Result};
use covgate::html::LineCovRenderer;
use covgate::links::StaticLink;
use covgate::parsers::gocover::GocoverParser;
use covgate::presubmit::Presubmit;
use covgate::profile::{InMemoryProfile, ProfileSource};
use covgate::publish::{CommentPoster, ReportArchive};
use covgate::report::MarkdownFormatter;

/// Build a set-mode profile from `(path, covered, total)` triples. Each file
/// gets one covered and one uncovered block.
pub fn profile(files: &[(&str, u64, u64)]) -> Vec<u8> {
    let mut out = String::from("mode: set\n");
    for &(path, covered, total) in files {
        if covered > 0 {
            out.push_str(&format!("{path}:1.1,2.1 {covered} 1\n"));
        }
        if total > covered {
            out.push_str(&format!("{path}:3.1,4.1 {} 0\n", total - covered));
        }
    }
    out.into_bytes()
}

pub struct FixedConcerned(pub Vec<&'static str>);

impl ConcernedFileSource for FixedConcerned {
    fn concerned_files(&self) -> Result<ConcernedFiles> {
        Ok(self.0.iter().copied().collect())
    }
}

pub struct FailingSource;

impl ProfileSource for FailingSource {
    fn read_profile(&self) -> Result<Vec<u8>> {
        Err(CovgateError::Fetch("storage unavailable".to_string()))
    }

    fn describe(&self) -> String {
        "failing remote".to_string()
    }
}

/// Records every report it is asked to store.
#[derive(Default)]
pub struct MemoryArchive {
    pub written: RefCell<Vec<String>>,
}

impl ReportArchive for MemoryArchive {
    fn write_report(&self, content: &str) -> Result<PathBuf> {
        self.written.borrow_mut().push(content.to_string());
        Ok(PathBuf::from("memory/bot-post"))
    }
}

#[derive(Default)]
pub struct MemoryComments {
    pub posted: RefCell<Vec<String>>,
}

impl CommentPoster for MemoryComments {
    fn clean_and_post(&self, body: &str) -> Result<()> {
        let mut posted = self.posted.borrow_mut();
        posted.clear();
        posted.push(body.to_string());
        Ok(())
    }
}

/// Records the profile it was asked to render.
pub struct FakeRenderer {
    pub fail: bool,
    pub output: PathBuf,
    pub rendered: RefCell<Option<Vec<u8>>>,
}

impl FakeRenderer {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            output: PathBuf::from("cov.html"),
            rendered: RefCell::new(None),
        }
    }
}

impl LineCovRenderer for FakeRenderer {
    fn render(&self, profile: &[u8]) -> Result<()> {
        *self.rendered.borrow_mut() = Some(profile.to_vec());
        if self.fail {
            Err(CovgateError::Render {
                command: "go tool cover".to_string(),
                output: "go: command not found".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn output(&self) -> &Path {
        &self.output
    }
}

/// Collaborators for one run, owned by the test.
pub struct Harness {
    pub gate: GateConfig,
    pub new: InMemoryProfile,
    pub base: InMemoryProfile,
    pub concerned: Option<FixedConcerned>,
    pub renderer: Option<FakeRenderer>,
    pub links: Option<StaticLink>,
    pub archive: MemoryArchive,
    pub comments: MemoryComments,
}

impl Harness {
    pub fn new(threshold: f64, base: Vec<u8>, new: Vec<u8>) -> Self {
        Self {
            gate: GateConfig::from_percent(threshold, 0.0).unwrap(),
            new: InMemoryProfile(new),
            base: InMemoryProfile(base),
            concerned: None,
            renderer: None,
            links: None,
            archive: MemoryArchive::default(),
            comments: MemoryComments::default(),
        }
    }

    pub fn presubmit(&self) -> Presubmit<'_> {
        Presubmit {
            gate: self.gate,
            parser: &GocoverParser,
            new_profile: &self.new,
            base_profile: &self.base,
            concerned: self.concerned.as_ref().map(|c| c as &dyn ConcernedFileSource),
            line_cov: self.renderer.as_ref().map(|r| r as &dyn LineCovRenderer),
            links: self.links.as_ref().map(|l| l as &dyn covgate::links::LinkTemplate),
            formatter: &MarkdownFormatter,
            archive: &self.archive,
            commenter: Some(&self.comments as &dyn CommentPoster),
        }
    }
}
