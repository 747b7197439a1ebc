use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata};

/// Log target used for every record emitted by the engine.
pub const LOG_TARGET: &str = "sapling";

/// Logger handle owned by an engine.
///
/// Records go to the injected [`Log`] implementation, or to the global
/// `log` facade when none was injected. Debug records are only emitted when
/// logging is enabled in the tree configuration; warnings always are.
#[derive(Clone)]
pub(crate) struct EngineLog {
    verbose: bool,
    sink: Option<Arc<dyn Log>>,
}

impl fmt::Debug for EngineLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLog")
            .field("verbose", &self.verbose)
            .field("injected", &self.sink.is_some())
            .finish()
    }
}

impl EngineLog {
    pub(crate) fn new(verbose: bool, sink: Option<Arc<dyn Log>>) -> Self {
        Self { verbose, sink }
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        if self.verbose {
            self.emit(Level::Debug, args);
        }
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, args);
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let logger: &dyn Log = match &self.sink {
            Some(sink) => sink.as_ref(),
            None => log::logger(),
        };
        let metadata =
            Metadata::builder().level(level).target(LOG_TARGET).build();
        if !logger.enabled(&metadata) {
            return;
        }
        logger.log(
            &log::Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Logger collecting formatted records for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct CapturingLog {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl CapturingLog {
        pub(crate) fn records(&self) -> Vec<(Level, String)> {
            self.records.lock().clone()
        }
    }

    impl Log for CapturingLog {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            self.records
                .lock()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }
}
