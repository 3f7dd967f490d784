//! Closure-aware constant analysis for JavaScript callbacks
//!
//! Takes an already-parsed ESTree document, interprets it over an abstract
//! domain and explores every interleaving of the callbacks the program hands
//! to its host until the abstract state stops changing. The result says, for
//! every captured variable and object property, whether it is provably
//! constant, varies, or is never observed.
//!
//! # Example
//!
//! ```
//! use jsabsint::{Analyzer, Classification};
//!
//! let ast = r#"{
//!   "type": "Program",
//!   "body": [{
//!     "type": "VariableDeclaration", "kind": "var",
//!     "declarations": [{
//!       "type": "VariableDeclarator",
//!       "id": {"type": "Identifier", "name": "answer"},
//!       "init": {"type": "Literal", "value": 42}
//!     }]
//!   }]
//! }"#;
//! let analysis = Analyzer::new().analyze_json(ast).unwrap();
//! assert!(matches!(analysis.report().get("global/answer"), Some(Classification::Constant(_))));
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod estree;
pub mod extractor;
pub mod heap;
pub mod interpreter;
pub mod lattice;
pub mod prelude;
pub mod reporter;
pub mod scheduler;
pub mod transform;

pub use ast::{LiteralValue, NodeId, Program, Span};
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, ErrorKind, ErrorReport};
pub use extractor::StaticInfo;
pub use lattice::{AbstractValue, Approx, Lattice};
pub use reporter::{Classification, Constant, Report};
pub use scheduler::{GlobalAbstractState, ScheduleStats, Scheduler};

use tracing::debug;

/// Entry point: holds the configuration shared by analysis runs
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer::default()
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Analyzer { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze an ESTree document given as JSON text
    pub fn analyze_json(&self, source: &str) -> Result<Analysis, AnalysisError> {
        self.analyze_program(estree::read_program(source)?)
    }

    /// Analyze an already decoded ESTree document
    pub fn analyze_value(&self, document: &serde_json::Value) -> Result<Analysis, AnalysisError> {
        self.analyze_program(estree::lower_program(document)?)
    }

    pub fn analyze_program(&self, program: Program) -> Result<Analysis, AnalysisError> {
        let info = extractor::extract(&program)?;
        let scheduler = Scheduler::start(&info, &self.config, &program)?;
        let (state, stats) = scheduler.run_to_fixpoint()?;
        let report = reporter::report(&info, &state, &self.config);
        debug!(
            entries = report.len(),
            rounds = stats.rounds,
            "analysis complete"
        );
        Ok(Analysis {
            program,
            info,
            state,
            report,
            stats,
        })
    }
}

/// A finished analysis run
#[derive(Debug, Clone)]
pub struct Analysis {
    program: Program,
    info: StaticInfo,
    state: GlobalAbstractState,
    report: Report,
    stats: ScheduleStats,
}

impl Analysis {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn info(&self) -> &StaticInfo {
        &self.info
    }

    pub fn state(&self) -> &GlobalAbstractState {
        &self.state
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn stats(&self) -> ScheduleStats {
        self.stats
    }

    /// The constant every evaluation of the identifier read `node` produced
    pub fn constant_for_read(&self, node: NodeId) -> Option<LiteralValue> {
        transform::constant_for_read(&self.state.heap, node)
    }

    /// The program with constant reads replaced by literals, and the number
    /// of replacements
    pub fn substitute_constants(&self) -> (Program, usize) {
        transform::substitute_constants(&self.program, &self.state.heap)
    }
}
