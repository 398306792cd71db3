//! Streaming parse and generation engines.
//!
//! [`StreamParser`] drives splitter → classifier → callback over an input
//! stream, either on the calling thread or fanned out over a bounded pool
//! of scoped worker threads. [`StreamGenerator`] is the inverse: it writes
//! a [`Schema`] out as one dialect's DDL in a fixed entity order.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::classify::dispatch;
use crate::error::{PortError, Result};
use crate::parser::StatementParser;
use crate::schema::{Schema, SchemaObject};
use crate::splitter::{SplitOptions, Statement, StatementSplitter};
use crate::transpiler::{Dialect, SqlGenerator};

/// A parse result tagged with the statement's sequence number. Skipped
/// statements travel as `None` so an ordered consumer can advance.
type Parsed = (u64, Option<SchemaObject>);

/// Parses SQL scripts into [`SchemaObject`]s.
pub struct StreamParser {
    parser: Box<dyn StatementParser>,
    options: SplitOptions,
}

impl StreamParser {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            parser: Box::new(dialect.parser()),
            options: dialect.split_options(),
        }
    }

    /// Use a custom parse capability and lexical rules.
    pub fn with_parser(parser: Box<dyn StatementParser>, options: SplitOptions) -> Self {
        Self { parser, options }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options.delimiter = delimiter.into();
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.options.delimiter
    }

    /// Parse `reader` on the calling thread, invoking `callback` for each
    /// object in input order. Stops at the first split, parse or callback
    /// error and returns it.
    pub fn parse_stream<R, F>(&self, reader: R, mut callback: F) -> Result<()>
    where
        R: Read,
        F: FnMut(SchemaObject) -> Result<()>,
    {
        let mut statements = 0usize;
        let mut objects = 0usize;
        for statement in StatementSplitter::new(reader, self.options.clone()) {
            let statement = statement?;
            statements += 1;
            if let Some(object) = dispatch(self.parser.as_ref(), &statement)? {
                callback(object)?;
                objects += 1;
            }
        }
        debug!(statements, objects, "Stream parsed");
        Ok(())
    }

    /// Parse `reader` with `workers` threads.
    ///
    /// The callback runs on the calling thread in arrival order, which is
    /// not input order. Produces the same set of objects as
    /// [`parse_stream`](Self::parse_stream).
    pub fn parse_stream_parallel<R, F>(&self, reader: R, callback: F, workers: usize) -> Result<()>
    where
        R: Read + Send,
        F: FnMut(SchemaObject) -> Result<()>,
    {
        self.run_parallel(reader, workers, false, callback)
    }

    /// Like [`parse_stream_parallel`](Self::parse_stream_parallel), but
    /// results are re-sequenced so the callback sees input order.
    pub fn parse_stream_parallel_ordered<R, F>(
        &self,
        reader: R,
        callback: F,
        workers: usize,
    ) -> Result<()>
    where
        R: Read + Send,
        F: FnMut(SchemaObject) -> Result<()>,
    {
        self.run_parallel(reader, workers, true, callback)
    }

    /// Collect a whole script into a [`Schema`].
    pub fn parse_schema<R: Read>(&self, reader: R) -> Result<Schema> {
        let mut schema = Schema::new();
        self.parse_stream(reader, |object| {
            schema.insert(object);
            Ok(())
        })?;
        Ok(schema)
    }

    fn run_parallel<R, F>(&self, reader: R, workers: usize, ordered: bool, mut callback: F) -> Result<()>
    where
        R: Read + Send,
        F: FnMut(SchemaObject) -> Result<()>,
    {
        let workers = workers.max(1);
        let cancel = CancelToken::new();
        let parser = self.parser.as_ref();

        let (stmt_tx, stmt_rx) = bounded::<Statement>(workers);
        let (out_tx, out_rx) = bounded::<Parsed>(workers);
        // Each worker and the producer report at most one error.
        let (err_tx, err_rx) = bounded::<PortError>(workers + 1);

        debug!(workers, ordered, "Starting parallel parse");

        let drained = thread::scope(|s| {
            let options = self.options.clone();
            let errors = err_tx.clone();
            let token = &cancel;
            s.spawn(move || produce(reader, options, stmt_tx, errors, token));

            for id in 0..workers {
                let statements = stmt_rx.clone();
                let results = out_tx.clone();
                let errors = err_tx.clone();
                s.spawn(move || work(id, parser, statements, results, errors, token, ordered));
            }
            // The results queue closes once the last worker drops its sender.
            drop(stmt_rx);
            drop(out_tx);
            drop(err_tx);

            let drained = drain(out_rx, ordered, &mut callback);
            if drained.is_err() {
                cancel.cancel();
            }
            drained
        });

        let delivered = drained?;
        let mut errors = err_rx.try_iter();
        if let Some(first) = errors.next() {
            for extra in errors {
                warn!(error = %extra, "Additional parse error");
            }
            return Err(first);
        }
        debug!(objects = delivered, "Parallel parse complete");
        Ok(())
    }
}

fn produce<R: Read>(
    reader: R,
    options: SplitOptions,
    statements: Sender<Statement>,
    errors: Sender<PortError>,
    cancel: &CancelToken,
) {
    let mut sent = 0usize;
    for next in StatementSplitter::new(reader, options) {
        let statement = match next {
            Ok(statement) => statement,
            Err(err) => {
                report(&errors, err);
                cancel.cancel();
                break;
            }
        };
        select! {
            send(statements, statement) -> res => {
                if res.is_err() {
                    break;
                }
            }
            recv(cancel.listen()) -> _ => break,
        }
        sent += 1;
    }
    debug!(statements = sent, "Producer finished");
}

/// Queue `err` for the caller without blocking. `false` when it was only logged.
fn report(errors: &Sender<PortError>, err: PortError) -> bool {
    match errors.try_send(err) {
        Ok(()) => true,
        Err(TrySendError::Full(err) | TrySendError::Disconnected(err)) => {
            warn!(error = %err, "Parse error not delivered");
            false
        }
    }
}

fn work(
    id: usize,
    parser: &dyn StatementParser,
    statements: Receiver<Statement>,
    results: Sender<Parsed>,
    errors: Sender<PortError>,
    cancel: &CancelToken,
    ordered: bool,
) {
    let mut parsed = 0usize;
    for statement in statements.iter() {
        match dispatch(parser, &statement) {
            Ok(object) => {
                if object.is_none() && !ordered {
                    continue;
                }
                if results.send((statement.seq, object)).is_err() {
                    break;
                }
                parsed += 1;
            }
            Err(err) => {
                warn!(worker = id, line = statement.line, error = %err, "Statement failed");
                report(&errors, err);
                // Stop reading input; siblings finish what is already queued.
                cancel.cancel();
                break;
            }
        }
    }
    debug!(worker = id, parsed, "Worker finished");
}

fn drain<F>(results: Receiver<Parsed>, ordered: bool, callback: &mut F) -> Result<usize>
where
    F: FnMut(SchemaObject) -> Result<()>,
{
    let mut delivered = 0usize;
    if !ordered {
        for (_, object) in results {
            if let Some(object) = object {
                callback(object)?;
                delivered += 1;
            }
        }
        return Ok(delivered);
    }

    let mut pending = BTreeMap::new();
    let mut next = 0u64;
    for (seq, object) in results {
        pending.insert(seq, object);
        while let Some(object) = pending.remove(&next) {
            next += 1;
            if let Some(object) = object {
                callback(object)?;
                delivered += 1;
            }
        }
    }
    Ok(delivered)
}

/// Options for [`StreamGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Written after every statement.
    pub terminator: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            terminator: ";".to_string(),
        }
    }
}

/// Writes a [`Schema`] as DDL.
///
/// Entities are emitted in a fixed order: tables (each followed by its
/// indexes), indexes whose table never arrived, views, functions,
/// procedures, triggers.
pub struct StreamGenerator {
    generator: Box<dyn SqlGenerator>,
    options: GenerateOptions,
}

impl StreamGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_generator(dialect.generator())
    }

    pub fn with_generator(generator: Box<dyn SqlGenerator>) -> Self {
        Self {
            generator,
            options: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.generator.dialect()
    }

    /// Render `schema` into `out`. The first write error is returned;
    /// output written before it is left as is.
    pub fn generate_stream<W: Write>(&self, schema: &Schema, mut out: W) -> Result<()> {
        let g = self.generator.as_ref();
        let term = self.options.terminator.as_str();

        for table in &schema.tables {
            write!(out, "{}{term}\n\n", g.render_table(table))?;
            for index in &table.indexes {
                writeln!(out, "{}{term}", g.render_index(&table.name, index))?;
            }
            if !table.indexes.is_empty() {
                writeln!(out)?;
            }
        }
        for detached in &schema.detached_indexes {
            write!(out, "{}{term}\n\n", g.render_index(&detached.table, &detached.index))?;
        }
        for view in &schema.views {
            write!(out, "{}{term}\n\n", g.render_view(view))?;
        }
        for function in &schema.functions {
            match g.render_function(function) {
                Some(sql) => self.write_routine(&mut out, &sql)?,
                None => warn!(
                    function = %function.name,
                    dialect = %g.dialect(),
                    "Dialect has no stored functions, skipping"
                ),
            }
        }
        for procedure in &schema.procedures {
            match g.render_procedure(procedure) {
                Some(sql) => self.write_routine(&mut out, &sql)?,
                None => warn!(
                    procedure = %procedure.name,
                    dialect = %g.dialect(),
                    "Dialect has no stored procedures, skipping"
                ),
            }
        }
        for trigger in &schema.triggers {
            for expanded in g.expand_trigger(trigger) {
                self.write_routine(&mut out, &g.render_trigger(&expanded))?;
            }
        }

        out.flush()?;
        debug!(objects = schema.object_count(), dialect = %g.dialect(), "Schema generated");
        Ok(())
    }

    /// Render `schema` into a string.
    pub fn generate_string(&self, schema: &Schema) -> Result<String> {
        let mut buf = Vec::new();
        self.generate_stream(schema, &mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    /// Routine bodies containing the terminator are fenced with a
    /// `DELIMITER` switch when the dialect wants one.
    fn write_routine<W: Write>(&self, out: &mut W, sql: &str) -> Result<()> {
        let term = self.options.terminator.as_str();
        match self.generator.routine_delimiter() {
            Some(delim) if sql.contains(term) => {
                write!(out, "DELIMITER {delim}\n{sql}{delim}\nDELIMITER {term}\n\n")?
            }
            _ => write!(out, "{sql}{term}\n\n")?,
        }
        Ok(())
    }
}
