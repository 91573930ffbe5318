//! The workbook model
//!
//! An [`ExcelModel`] gathers the cells of one or more books into a single
//! computation graph. While the model is *building*, books are loaded and
//! their cells compiled. [`ExcelModel::finish`] then links references
//! between cells and resolves defined names. Circular references are
//! resolved at calculation time, after overrides have cut the graph. A
//! finished model can be calculated, compiled into standalone functions and
//! written back to books.
//!
//! # Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let book = Workbook::new("excel.xlsx").with_sheet(
//!     Worksheet::new("DATA").with("A1", 2.0).with("B1", "=A1*21"),
//! );
//! let mut model = ExcelModel::new();
//! model.load(&book).unwrap();
//! model.finish(CalculationOptions::default()).unwrap();
//! model.calculate().unwrap();
//! assert_eq!(model.value("'[excel.xlsx]DATA'!B1").unwrap(), Range::scalar(42.0));
//! ```

use crate::book::{BookSource, CellContent};
use crate::calculation::{CalculationOptions, CalculationStats};
use crate::error::{ModelError, ModelResult};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use sheetcalc_core::{CellError, CellRange, CellValue, Qualifier, Reference};
use sheetcalc_formula::{
    global_registry, BinaryOperator, Cell, CompiledFunction, Dispatcher, FunctionRegistry, Graph,
    NodeId, Operation, Range, Value,
};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// Calculated values by book, sheet and cell address
pub type BookValues = BTreeMap<String, BTreeMap<String, BTreeMap<String, CellValue>>>;

/// Names of a loaded book and its sheets, as the book spells them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BookInfo {
    name: String,
    sheets: Vec<String>,
}

impl BookInfo {
    fn sheet(&self, name: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|s| same_name(s, name))
            .map(String::as_str)
    }

    /// Sheets from `first` to `last` in book order
    fn span(&self, first: &str, last: &str) -> Option<&[String]> {
        let a = self.sheets.iter().position(|s| same_name(s, first))?;
        let b = self.sheets.iter().position(|s| same_name(s, last))?;
        Some(&self.sheets[a.min(b)..=a.max(b)])
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

/// Graph key of a defined name
fn name_key(book: &str, name: &str) -> String {
    format!("[{}]{}", book.to_uppercase(), name.to_uppercase())
}

/// Last used row and column among `cells`
fn extent(cells: impl IntoIterator<Item = CellRange>) -> (u32, u16) {
    cells.into_iter().fold((0, 0), |(row, col), cell| {
        (row.max(cell.end.row), col.max(cell.end.col))
    })
}

/// Bound whole rows and columns to the used part of the sheet
fn clip(range: CellRange, (last_row, last_col): (u32, u16)) -> CellRange {
    let mut clipped = range;
    if range.is_whole_column() {
        clipped.end.row = last_row.max(range.start.row);
    }
    if range.is_whole_row() {
        clipped.end.col = last_col.max(range.start.col);
    }
    clipped
}

/// Position of `inner` relative to the top-left cell of `outer`
fn offset(outer: &CellRange, inner: &CellRange) -> (i64, i64) {
    (
        inner.start.row as i64 - outer.start.row as i64,
        inner.start.col as i64 - outer.start.col as i64,
    )
}

/// Cells of several workbooks compiled into one graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ModelSnapshot", into = "ModelSnapshot")]
pub struct ExcelModel {
    books: Vec<BookInfo>,
    /// Declared cells by output key
    cells: BTreeMap<String, Reference>,
    /// Defined names by `[BOOK]NAME`
    names: BTreeMap<String, Reference>,
    graph: Graph,
    /// Set once finished
    options: Option<CalculationOptions>,
    /// Results of the last calculation by output key
    values: BTreeMap<String, Range>,
    registry: Arc<FunctionRegistry>,
}

impl Default for ExcelModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelModel {
    /// Create an empty model using the built-in functions
    pub fn new() -> Self {
        Self {
            books: Vec::new(),
            cells: BTreeMap::new(),
            names: BTreeMap::new(),
            graph: Graph::new(),
            options: None,
            values: BTreeMap::new(),
            registry: global_registry(),
        }
    }

    /// Use another function registry
    ///
    /// Set it before loading books: cells calling a function the registry
    /// lacks compile to `#NAME?`. Snapshots keep function names only, so a
    /// model restored with [`from_json`](Self::from_json) needs its registry
    /// set again.
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Check if [`finish`](Self::finish) has run
    pub fn is_finished(&self) -> bool {
        self.options.is_some()
    }

    /// Options the model was finished with
    pub fn options(&self) -> Option<&CalculationOptions> {
        self.options.as_ref()
    }

    /// The computation graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Names of the loaded books
    pub fn books(&self) -> impl Iterator<Item = &str> {
        self.books.iter().map(|b| b.name.as_str())
    }

    /// Declared cells, fully qualified
    pub fn cells(&self) -> impl Iterator<Item = &Reference> {
        self.cells.values()
    }

    fn book(&self, name: &str) -> Option<&BookInfo> {
        self.books.iter().find(|b| same_name(&b.name, name))
    }

    fn node(&self, key: &str) -> ModelResult<NodeId> {
        self.graph
            .id(key)
            .ok_or_else(|| ModelError::UnknownReference(key.to_string()))
    }

    /// Compile the cells and names of a book into the model
    pub fn load<B: BookSource + ?Sized>(&mut self, book: &B) -> ModelResult<()> {
        if self.is_finished() {
            return Err(ModelError::AlreadyFinished);
        }
        let name = book.book_name();
        if self.book(name).is_some() {
            return Err(ModelError::DuplicateBook(name.to_string()));
        }

        let mut info = BookInfo {
            name: name.to_string(),
            sheets: book.sheet_names().into_iter().map(String::from).collect(),
        };
        let mut count = 0;
        for (sheet, address, content) in book.cells() {
            if info.sheet(sheet).is_none() {
                info.sheets.push(sheet.to_string());
            }
            let range = CellRange::parse(address)?;
            let reference = Reference::qualified(name, sheet, range);
            let key = reference.to_string();
            let cell = match content {
                CellContent::Formula(formula) => Cell::compile(reference, formula, &self.registry)
                    .map_err(|source| ModelError::Cell {
                        cell: key.clone(),
                        source,
                    })?,
                CellContent::Value(value) => Cell::constant(
                    reference,
                    Range::filled(range.row_count() as usize, range.col_count() as usize, value.clone()),
                ),
            };
            cell.add(&mut self.graph).map_err(|source| ModelError::Cell {
                cell: key.clone(),
                source,
            })?;
            self.cells.insert(key, cell.reference.clone());
            count += 1;
        }

        let mut names = 0;
        for (defined, text) in book.defined_names() {
            let target = Reference::parse(text)?;
            let Some(sheet) = target.sheet.clone() else {
                return Err(ModelError::InvalidBook(format!(
                    "name {} must refer to a sheet, got {}",
                    defined, text
                )));
            };
            self.names.insert(name_key(name, defined), target.qualify(name, &sheet));
            names += 1;
        }

        log::debug!(
            "loaded book {} ({} sheets, {} cells, {} names)",
            name,
            info.sheets.len(),
            count,
            names
        );
        self.books.push(info);
        Ok(())
    }

    /// Link references and names
    ///
    /// With `options.iterative` unset every cell of a circular reference
    /// evaluates to `#CIRCULAR!`. A cell given a value by an override or a
    /// compiled-function argument no longer closes the cycles through it.
    pub fn finish(&mut self, options: CalculationOptions) -> ModelResult<()> {
        if self.is_finished() {
            return Err(ModelError::AlreadyFinished);
        }
        self.link_names()?;
        self.link_references()?;

        log::debug!(
            "model finished: {} nodes, {} circular references",
            self.graph.len(),
            self.graph.cycles().len()
        );
        self.options = Some(options);
        Ok(())
    }

    fn link_names(&mut self) -> ModelResult<()> {
        for (key, target) in &self.names {
            let data = self.graph.ensure_input(&target.to_string());
            self.graph
                .add_node(key.clone(), Operation::Reference(target.clone()), vec![data])?;
        }

        let uses: Vec<(NodeId, Operation, String)> = self
            .graph
            .nodes()
            .filter_map(|(id, node)| match &node.operation {
                Operation::Name {
                    book: Some(book),
                    name,
                } => Some((id, node.operation.clone(), name_key(book, name))),
                _ => None,
            })
            .collect();
        for (id, operation, key) in uses {
            match self.graph.id(&key) {
                Some(definition) => self.graph.set_operation(id, operation, vec![definition])?,
                None => log::debug!("{} is not defined", key),
            }
        }
        Ok(())
    }

    fn link_references(&mut self) -> ModelResult<()> {
        let mut sheets: AHashMap<(String, String), Vec<(CellRange, NodeId)>> = AHashMap::new();
        for (key, reference) in &self.cells {
            if let (Some(book), Some(sheet)) = (&reference.book, &reference.sheet) {
                let id = self.node(key)?;
                sheets
                    .entry((book.clone(), sheet.clone()))
                    .or_default()
                    .push((reference.range, id));
            }
        }

        let mut linker = Linker {
            graph: &mut self.graph,
            books: &self.books,
            sheets,
            pending: Vec::new(),
        };
        linker.run()
    }

    /// Calculate every cell from the declared values
    pub fn calculate(&mut self) -> ModelResult<CalculationStats> {
        self.calculate_with_overrides(Vec::<(&str, Range)>::new())
    }

    /// Calculate every cell, replacing the values of some references
    ///
    /// Overrides only affect this calculation. A reference that is not a
    /// cell of its own is split over the declared cells it covers.
    pub fn calculate_with_overrides<I, K>(&mut self, overrides: I) -> ModelResult<CalculationStats>
    where
        I: IntoIterator<Item = (K, Range)>,
        K: AsRef<str>,
    {
        if !self.is_finished() {
            return Err(ModelError::NotFinished);
        }
        let mut inputs = AHashMap::new();
        for (reference, value) in overrides {
            self.add_override(reference.as_ref(), value, &mut inputs)?;
        }

        let outputs = self
            .cells
            .keys()
            .map(|key| self.node(key))
            .collect::<ModelResult<Vec<_>>>()?;
        let solution = self.dispatcher().dispatch(&inputs, &outputs)?;

        let values: BTreeMap<String, Range> = self
            .cells
            .keys()
            .cloned()
            .zip(solution.outputs.into_iter().map(Value::into_range))
            .collect();
        let stats = CalculationStats {
            cells_calculated: values.len(),
            cycles: solution.cycles.len(),
            iterations: solution.cycles.iter().map(|c| c.iterations).max().unwrap_or(0),
            errors: values.values().filter(|v| v.first_error().is_some()).count(),
            converged: solution.cycles.iter().all(|c| c.converged),
        };
        log::debug!(
            "calculated {} cells ({} errors, {} circular references)",
            stats.cells_calculated,
            stats.errors,
            stats.cycles
        );
        self.values = values;
        Ok(stats)
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        let settings = self.options.unwrap_or_default().cycle_settings();
        Dispatcher::new(&self.graph, Arc::clone(&self.registry)).with_cycles(settings)
    }

    fn add_override(
        &self,
        text: &str,
        value: Range,
        inputs: &mut AHashMap<NodeId, Value>,
    ) -> ModelResult<()> {
        let reference = self.resolve(text)?;
        let key = reference.to_string();
        if self.cells.contains_key(&key) {
            let fitted = value.project(reference.rows(), reference.cols());
            inputs.insert(self.node(&key)?, Value::Range(fitted));
            return Ok(());
        }

        let mut covered = 0;
        for (cell_key, cell) in self.cells.iter().filter(|(_, cell)| reference.contains(cell)) {
            let (row, col) = offset(&reference.range, &cell.range);
            let part = value.slice(row as usize, col as usize, cell.rows(), cell.cols());
            inputs.insert(self.node(cell_key)?, Value::Range(part));
            covered += 1;
        }
        if covered > 0 {
            log::trace!("override {} split over {} cells", text, covered);
            return Ok(());
        }

        match self.graph.id(&key) {
            Some(id) => {
                let fitted = match &self.graph.get(id)?.operation {
                    Operation::Assemble { rows, cols, .. } => value.project(*rows, *cols),
                    _ => value,
                };
                inputs.insert(id, Value::Range(fitted));
            }
            None => log::warn!("override {} does not cover any cell", text),
        }
        Ok(())
    }

    /// Qualified reference, or the target of a defined name
    ///
    /// Names may carry their book (`'[excel.xlsx]DATA'!INPUT_A`); a bare
    /// name must be defined by exactly one book.
    fn resolve(&self, text: &str) -> ModelResult<Reference> {
        if let Ok(reference) = Reference::parse(text) {
            return if reference.is_qualified() {
                Ok(reference)
            } else {
                Err(ModelError::UnknownReference(text.to_string()))
            };
        }

        let (qualifier, name) = Qualifier::split(text)?;
        let found = match qualifier.book {
            Some(book) => self.names.get(&name_key(&book, name)),
            None => {
                let mut matches = self
                    .books
                    .iter()
                    .filter_map(|b| self.names.get(&name_key(&b.name, name)));
                match (matches.next(), matches.next()) {
                    (Some(target), None) => Some(target),
                    _ => None,
                }
            }
        };
        found
            .cloned()
            .ok_or_else(|| ModelError::UnknownReference(text.to_string()))
    }

    /// Calculated values of a cell, range or defined name
    pub fn value(&self, reference: &str) -> ModelResult<Range> {
        if !self.is_finished() {
            return Err(ModelError::NotFinished);
        }
        if self.values.is_empty() && !self.cells.is_empty() {
            return Err(ModelError::NotCalculated);
        }
        let reference = self.resolve(reference)?;
        if let Some(values) = self.values.get(&reference.to_string()) {
            return Ok(values.clone());
        }

        let known = match (&reference.book, &reference.sheet) {
            (Some(book), Some(sheet)) if !reference.is_3d() => {
                self.book(book).and_then(|b| b.sheet(sheet)).is_some()
            }
            _ => false,
        };
        if !known {
            return Err(ModelError::UnknownReference(reference.to_string()));
        }

        let on_sheet: Vec<&Reference> = self
            .cells
            .values()
            .filter(|cell| cell.same_sheet(&reference))
            .collect();
        let range = clip(reference.range, extent(on_sheet.iter().map(|c| c.range)));
        let mut grid = Range::filled(
            range.row_count() as usize,
            range.col_count() as usize,
            CellValue::Empty,
        );
        for cell in on_sheet.into_iter().filter(|c| c.range.overlaps(&range)) {
            if let Some(values) = self.values.get(&cell.to_string()) {
                let (row, col) = offset(&range, &cell.range);
                grid.paste(row, col, values);
            }
        }
        Ok(grid)
    }

    /// Extract a function computing `outputs` from `inputs`
    ///
    /// References may be cells, ranges known to the graph or defined names.
    /// The function owns its part of the graph and does not see later
    /// changes to the model.
    pub fn compile(&self, inputs: &[&str], outputs: &[&str]) -> ModelResult<CompiledFunction> {
        if !self.is_finished() {
            return Err(ModelError::NotFinished);
        }
        let input_ids = self.nodes_of(inputs)?;
        let output_ids = self.nodes_of(outputs)?;
        let function = self.dispatcher().compile(&input_ids, &output_ids)?;
        log::debug!(
            "compiled {} inputs to {} outputs ({} nodes)",
            inputs.len(),
            outputs.len(),
            function.graph().len()
        );
        Ok(function)
    }

    fn nodes_of(&self, references: &[&str]) -> ModelResult<Vec<NodeId>> {
        references
            .iter()
            .map(|text| {
                let reference = self.resolve(text)?;
                self.graph
                    .id(&reference.to_string())
                    .ok_or_else(|| ModelError::UnknownReference(text.to_string()))
            })
            .collect()
    }

    /// Values of the last calculation, by book, sheet and address
    pub fn write(&self) -> BookValues {
        let mut out = BookValues::new();
        for (key, reference) in &self.cells {
            let (Some(values), Some(book), Some(sheet)) = (
                self.values.get(key),
                reference.book.as_deref(),
                reference.sheet.as_deref(),
            ) else {
                continue;
            };
            let (book_name, sheet_name) = match self.book(book) {
                Some(info) => (info.name.clone(), info.sheet(sheet).unwrap_or(sheet).to_string()),
                None => (book.to_string(), sheet.to_string()),
            };
            let target = out
                .entry(book_name)
                .or_default()
                .entry(sheet_name)
                .or_default();
            let cols = reference.cols();
            for (i, address) in reference.range.cells().enumerate() {
                let value = values.get(i / cols, i % cols).cloned().unwrap_or_default();
                target.insert(address.to_string(), value);
            }
        }
        out
    }

    /// Hand the values of the last calculation to `book`
    pub fn write_to<B: BookSource + ?Sized>(&self, book: &mut B) {
        let mut all = self.write();
        let name = book.book_name().to_string();
        let Some(key) = all.keys().find(|k| same_name(k, &name)).cloned() else {
            log::warn!("book {} is not part of the model", name);
            return;
        };
        if let Some(sheets) = all.remove(&key) {
            for (sheet, values) in sheets {
                book.store(&sheet, values);
            }
        }
    }

    /// Serialize the whole model
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a model serialized with [`to_json`](Self::to_json)
    ///
    /// The restored model evaluates with the built-in functions; chain
    /// [`with_registry`](Self::with_registry) when the original used others.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the whole model to a writer
    pub fn to_writer<W: Write>(&self, writer: W) -> ModelResult<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Restore a model from a reader, with the built-in functions
    pub fn from_reader<R: Read>(reader: R) -> ModelResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Serialized form of a model; functions are referred to by name
#[derive(Serialize, Deserialize)]
struct ModelSnapshot {
    books: Vec<BookInfo>,
    cells: BTreeMap<String, Reference>,
    names: BTreeMap<String, Reference>,
    graph: Graph,
    options: Option<CalculationOptions>,
    #[serde(default)]
    values: BTreeMap<String, Range>,
}

impl From<ExcelModel> for ModelSnapshot {
    fn from(model: ExcelModel) -> Self {
        Self {
            books: model.books,
            cells: model.cells,
            names: model.names,
            graph: model.graph,
            options: model.options,
            values: model.values,
        }
    }
}

impl From<ModelSnapshot> for ExcelModel {
    fn from(snapshot: ModelSnapshot) -> Self {
        Self {
            books: snapshot.books,
            cells: snapshot.cells,
            names: snapshot.names,
            graph: snapshot.graph,
            options: snapshot.options,
            values: snapshot.values,
            registry: global_registry(),
        }
    }
}

/// Defines the placeholders left by cell compilation
struct Linker<'a> {
    graph: &'a mut Graph,
    books: &'a [BookInfo],
    /// Declared cells per `(BOOK, SHEET)`
    sheets: AHashMap<(String, String), Vec<(CellRange, NodeId)>>,
    pending: Vec<NodeId>,
}

impl Linker<'_> {
    fn run(&mut self) -> ModelResult<()> {
        self.pending = self.graph.placeholders();
        let mut linked = 0;
        while let Some(id) = self.pending.pop() {
            let key = self.graph.get(id)?.key.clone();
            let (operation, dependencies) = self.resolve(&key)?;
            log::trace!("{} -> {:?}", key, operation);
            self.graph.set_operation(id, operation, dependencies)?;
            linked += 1;
        }
        log::debug!("linked {} references", linked);
        Ok(())
    }

    /// Placeholder for `key`, queued for linking if it is new
    fn input(&mut self, key: &str) -> NodeId {
        let known = self.graph.len();
        let id = self.graph.ensure_input(key);
        if id >= known {
            self.pending.push(id);
        }
        id
    }

    fn resolve(&mut self, key: &str) -> ModelResult<(Operation, Vec<NodeId>)> {
        let broken = || (Operation::Constant(Range::scalar(CellError::Ref)), Vec::new());
        let Ok(reference) = Reference::parse(key) else {
            log::debug!("{} is not a reference", key);
            return Ok(broken());
        };
        let (Some(book), Some(sheet)) = (reference.book.as_deref(), reference.sheet.as_deref()) else {
            return Ok(broken());
        };
        let books = self.books;
        let Some(info) = books.iter().find(|b| same_name(&b.name, book)) else {
            log::debug!("{}: book {} is not loaded", key, book);
            return Ok(broken());
        };

        if let Some(last) = reference.last_sheet.as_deref() {
            let Some(span) = info.span(sheet, last) else {
                log::debug!("{}: unknown sheet span", key);
                return Ok(broken());
            };
            let mut dependencies = Vec::with_capacity(span.len());
            for (i, name) in span.iter().enumerate() {
                let single = reference.on_sheet(name);
                let data = self.input(&single.to_string());
                let id = self.graph.add_node(
                    format!("{}|{}", key, i),
                    Operation::Reference(single),
                    vec![data],
                )?;
                dependencies.push(id);
            }
            return Ok((Operation::Operator(BinaryOperator::Union), dependencies));
        }

        if info.sheet(sheet).is_none() {
            log::debug!("{}: sheet {} is not in {}", key, sheet, info.name);
            return Ok(broken());
        }
        let cells = self
            .sheets
            .get(&(book.to_string(), sheet.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let range = clip(reference.range, extent(cells.iter().map(|(c, _)| *c)));
        let (offsets, dependencies): (Vec<(i64, i64)>, Vec<NodeId>) = cells
            .iter()
            .filter(|(cell, _)| cell.overlaps(&range))
            .map(|(cell, id)| (offset(&range, cell), *id))
            .unzip();
        Ok((
            Operation::Assemble {
                reference: reference.with_range(range),
                rows: range.row_count() as usize,
                cols: range.col_count() as usize,
                offsets,
            },
            dependencies,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Workbook, Worksheet};
    use pretty_assertions::assert_eq;

    fn model(book: Workbook, options: CalculationOptions) -> ExcelModel {
        let mut model = ExcelModel::new();
        model.load(&book).unwrap();
        model.finish(options).unwrap();
        model
    }

    #[test]
    fn test_clip_whole_columns_and_rows() {
        let columns = CellRange::parse("A:C").unwrap();
        assert_eq!(clip(columns, (4, 1)), CellRange::parse("A1:C5").unwrap());
        let rows = CellRange::parse("2:3").unwrap();
        assert_eq!(clip(rows, (0, 3)), CellRange::parse("A2:D3").unwrap());
        let plain = CellRange::parse("B2:C3").unwrap();
        assert_eq!(clip(plain, (100, 100)), plain);
    }

    #[test]
    fn test_book_span() {
        let info = BookInfo {
            name: "b".into(),
            sheets: vec!["One".into(), "Two".into(), "Three".into()],
        };
        assert_eq!(info.span("THREE", "two").unwrap(), &["Two".to_string(), "Three".to_string()]);
        assert!(info.span("One", "Four").is_none());
        assert_eq!(info.sheet("ONE"), Some("One"));
    }

    #[test]
    fn test_state_machine() {
        let book = Workbook::new("b").with_sheet(Worksheet::new("s").with("A1", 1.0));
        let mut model = ExcelModel::new();
        assert!(matches!(model.calculate(), Err(ModelError::NotFinished)));
        assert!(matches!(model.compile(&[], &[]), Err(ModelError::NotFinished)));
        model.load(&book).unwrap();
        assert!(matches!(model.load(&book), Err(ModelError::DuplicateBook(_))));
        model.finish(CalculationOptions::default()).unwrap();
        assert!(matches!(model.value("'[b]s'!A1"), Err(ModelError::NotCalculated)));
        assert!(matches!(model.load(&book), Err(ModelError::AlreadyFinished)));
        assert!(matches!(
            model.finish(CalculationOptions::default()),
            Err(ModelError::AlreadyFinished)
        ));
    }

    #[test]
    fn test_linking_leaves_no_placeholders() {
        let book = Workbook::new("b").with_sheet(
            Worksheet::new("s")
                .with("A1", "=SUM(B1:B3)+C9+'[other]s'!A1+nosheet!A1")
                .with("B2", 2.0),
        );
        let mut model = model(book, CalculationOptions::default());
        assert!(model.graph().placeholders().is_empty());
        model.calculate().unwrap();
        assert_eq!(model.value("'[b]s'!A1").unwrap(), Range::scalar(CellError::Ref));
    }

    #[test]
    fn test_parse_error_names_the_cell() {
        let book = Workbook::new("b").with_sheet(Worksheet::new("s").with("A1", "=1+"));
        let err = ExcelModel::new().load(&book).unwrap_err();
        match err {
            ModelError::Cell { cell, .. } => assert_eq!(cell, "'[B]S'!A1"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_resolve_names() {
        let book = Workbook::new("excel.xlsx")
            .with_sheet(Worksheet::new("DATA").with("A2", 3.0))
            .with_name("INPUT_A", "DATA!$A$2");
        let model = model(book, CalculationOptions::default());
        let expected = Reference::parse("'[EXCEL.XLSX]DATA'!A2").unwrap();
        assert_eq!(model.resolve("'[excel.xlsx]DATA'!INPUT_A").unwrap(), expected);
        assert_eq!(model.resolve("input_a").unwrap(), expected);
        assert!(matches!(model.resolve("A2"), Err(ModelError::UnknownReference(_))));
        assert!(matches!(model.resolve("MISSING"), Err(ModelError::UnknownReference(_))));
    }
}
