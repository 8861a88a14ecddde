//! Collection: the document store and its index subsystem (spec.md §4.4)
//!
//! A collection owns `data` (the document vector), the `$id`→position
//! relationship (`id_index`, parallel to `data` and kept sorted ascending
//! by never reusing an id - resolving spec.md §9's open question via
//! option (a)), the three index kinds, named transforms, and the dynamic
//! views observing it.

pub mod error;
pub mod options;
pub mod transform;

pub use error::{CollectionError, CollectionResult};
pub use options::{CollectionOptions, TtlOptions};
pub use transform::TransformStep;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::diagnostics::{Logger, Severity};
use crate::document::{self, Meta};
use crate::dynamic_view::DynamicView;
use crate::index::{BinaryIndex, ExactIndex, RangeOp, UniqueIndex};
use crate::query::{CompiledPath, Query};
use crate::resultset::Resultset;

struct TransactionSnapshot {
    data: Vec<Value>,
    id_index: Vec<u64>,
    max_id: u64,
    binary_indices: HashMap<String, BinaryIndex>,
    unique_constraints: HashMap<String, UniqueIndex>,
    exact_constraints: HashMap<String, ExactIndex>,
    dynamic_views: Vec<DynamicView>,
}

/// An in-memory, schemaless document store with indices and dynamic views.
pub struct Collection {
    name: String,
    data: Vec<Value>,
    id_index: Vec<u64>,
    max_id: u64,
    binary_indices: HashMap<String, BinaryIndex>,
    unique_constraints: HashMap<String, UniqueIndex>,
    exact_constraints: HashMap<String, ExactIndex>,
    transforms: HashMap<String, Vec<TransformStep>>,
    dynamic_views: Vec<DynamicView>,
    options: CollectionOptions,
    transaction: Option<TransactionSnapshot>,
}

impl Collection {
    pub fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        let mut binary_indices = HashMap::new();
        for property in &options.indices {
            let index = if options.adaptive_binary_indices {
                BinaryIndex::new_adaptive(property.clone())
            } else {
                BinaryIndex::new(property.clone())
            };
            binary_indices.insert(property.clone(), index);
        }
        let unique_constraints = options
            .unique
            .iter()
            .map(|f| (f.clone(), UniqueIndex::new(f.clone())))
            .collect();
        let exact_constraints = options
            .exact
            .iter()
            .map(|f| (f.clone(), ExactIndex::new(f.clone())))
            .collect();
        Self {
            name: name.into(),
            data: Vec::new(),
            id_index: Vec::new(),
            max_id: 0,
            binary_indices,
            unique_constraints,
            exact_constraints,
            transforms: HashMap::new(),
            dynamic_views: Vec::new(),
            options,
            transaction: None,
        }
    }

    /// Reconstructs a collection from persisted shell data (name, raw
    /// `data`/`id_index`/`max_id`, and configuration): every index is
    /// rederived from `data` rather than deserialized directly, matching
    /// the "indices are derived, in-memory-only state rebuilt from storage
    /// on startup" contract. `force_rebuild` is set by the database's
    /// version-gated upgrade path (`databaseVersion < 1.5`).
    pub fn restore(
        name: impl Into<String>,
        options: CollectionOptions,
        data: Vec<Value>,
        id_index: Vec<u64>,
        max_id: u64,
        force_rebuild: bool,
    ) -> CollectionResult<Self> {
        let mut coll = Collection::new(name, options);
        coll.data = data;
        coll.id_index = id_index;
        coll.max_id = max_id;

        for field in coll.options.unique.clone() {
            let data = &coll.data;
            let index = coll
                .unique_constraints
                .entry(field.clone())
                .or_insert_with(|| UniqueIndex::new(field.clone()));
            index.rebuild(data.len(), |p| data[p].get(&field).cloned().unwrap_or(Value::Null))?;
        }
        for field in coll.options.exact.clone() {
            let data = &coll.data;
            let index = coll
                .exact_constraints
                .entry(field.clone())
                .or_insert_with(|| ExactIndex::new(field.clone()));
            index.rebuild(data.len(), |p| data[p].get(&field).cloned().unwrap_or(Value::Null));
        }
        // Binary indices are never persisted - whether or not construction
        // left them clean-and-empty (the adaptive case), they don't yet
        // reflect the data just loaded, so every restore always derives
        // them fresh regardless of `force_rebuild`.
        for index in coll.binary_indices.values_mut() {
            index.mark_dirty();
        }
        let properties: Vec<String> = coll.options.indices.clone();
        for property in properties {
            coll.ensure_index(&property, force_rebuild);
        }
        for view in &mut coll.dynamic_views {
            view.rematerialize(&coll.data);
        }
        Ok(coll)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    fn position_of(&self, id: u64) -> Option<usize> {
        self.id_index.binary_search(&id).ok()
    }

    pub fn get(&self, id: u64) -> Option<&Value> {
        self.position_of(id).map(|p| &self.data[p])
    }

    pub fn get_with_position(&self, id: u64) -> Option<(&Value, usize)> {
        self.position_of(id).map(|p| (&self.data[p], p))
    }

    // ---- indices -----------------------------------------------------

    pub fn binary_index(&self, property: &str) -> Option<&BinaryIndex> {
        self.binary_indices.get(property)
    }

    /// Creates or rebuilds a binary index on `property`. No-op if one
    /// already exists and is clean, unless `force`.
    pub fn ensure_index(&mut self, property: &str, force: bool) {
        let path = CompiledPath::compile(property);
        let data = &self.data;
        // Always created dirty here, even under adaptive maintenance: a
        // newly-named index may be introduced over an already-populated
        // collection, and adaptive maintenance only keeps a *previously
        // correct* index correct - it never retroactively indexes
        // pre-existing data. Only `Collection::new`'s construction-time
        // indices (always built over zero documents) are safe to start
        // clean.
        let index = self
            .binary_indices
            .entry(property.to_string())
            .or_insert_with(|| BinaryIndex::new(property));
        let was_dirty = index.is_dirty();
        index.ensure(data.len(), force, |p| path.get_scalar(&data[p]));
        if force || was_dirty {
            Logger::log(Severity::Info, "index.rebuild", &[("property", property)]);
        }
    }

    /// Validates monotonicity of an existing binary index. Errors if no
    /// index exists on `property`.
    pub fn check_index(
        &mut self,
        property: &str,
        random_sampling: bool,
        sampling_factor: f64,
        repair: bool,
    ) -> CollectionResult<bool> {
        let path = CompiledPath::compile(property);
        let data_len = self.data.len();
        let ok = {
            let data = &self.data;
            let index = self
                .binary_indices
                .get(property)
                .ok_or_else(|| CollectionError::InvalidIndex(property.to_string()))?;
            index.check(|p| path.get_scalar(&data[p]), random_sampling, sampling_factor)
        };
        if !ok && repair {
            let data = &self.data;
            if let Some(index) = self.binary_indices.get_mut(property) {
                index.rebuild(data_len, |p| path.get_scalar(&data[p]));
            }
            Logger::log_stderr(Severity::Warn, "index.repair", &[("property", property)]);
        }
        Ok(ok)
    }

    /// Resolves an index-eligible range query against `property`'s
    /// binary index, rebuilding it first if dirty. Returns `None` if no
    /// index exists on `property`.
    pub fn range_positions(&mut self, property: &str, op: &RangeOp) -> Option<Vec<usize>> {
        self.ensure_index(property, false);
        let path = CompiledPath::compile(property);
        let data = &self.data;
        let index = self.binary_indices.get(property)?;
        Some(index.calculate_range(op, &|p| path.get_scalar(&data[p])))
    }

    /// Read-only counterpart of [`Collection::range_positions`] for the
    /// Resultset fast path: only usable if the index already exists and
    /// is clean. A dirty index means "not usable right now" rather than
    /// triggering a rebuild, since `Resultset` only ever holds `&Collection`.
    pub fn indexed_range(&self, property: &str, op: &RangeOp) -> Option<Vec<usize>> {
        let index = self.binary_indices.get(property)?;
        if index.is_dirty() {
            return None;
        }
        let path = CompiledPath::compile(property);
        let data = &self.data;
        Some(index.calculate_range(op, &|p| path.get_scalar(&data[p])))
    }

    /// Begins a chainable query pipeline over this collection.
    pub fn chain(&self) -> crate::resultset::Resultset<'_> {
        crate::resultset::Resultset::new(self)
    }

    // ---- mutation ------------------------------------------------------

    fn check_unique_conflicts(&self, doc: &Value) -> CollectionResult<()> {
        for field in &self.options.unique {
            let value = doc.get(field).cloned().unwrap_or(Value::Null);
            if let Some(index) = self.unique_constraints.get(field) {
                if index.get(&value).is_some() {
                    Logger::log_stderr(
                        Severity::Warn,
                        "unique.conflict",
                        &[("field", field.as_str()), ("value", &value.to_string())],
                    );
                    return Err(CollectionError::DuplicateKey {
                        field: field.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn insert_single(&mut self, mut doc: Value, adaptive_binary: bool) -> CollectionResult<Value> {
        if !doc.is_object() {
            return Err(CollectionError::invalid_argument("document must be a JSON object"));
        }
        self.check_unique_conflicts(&doc)?;

        self.max_id += 1;
        let id = self.max_id;
        document::set_id(&mut doc, id);
        if !self.options.disable_meta {
            document::set_meta(&mut doc, &Meta::new(Utc::now()));
        }

        let position = self.data.len();
        for field in self.options.unique.clone() {
            let value = doc.get(&field).cloned().unwrap_or(Value::Null);
            self.unique_constraints
                .get_mut(&field)
                .expect("constructed from options.unique")
                .set(&value, position)
                .expect("pre-checked for conflicts");
        }
        for field in self.options.exact.clone() {
            let value = doc.get(&field).cloned().unwrap_or(Value::Null);
            self.exact_constraints
                .get_mut(&field)
                .expect("constructed from options.exact")
                .insert(&value, position);
        }

        self.data.push(doc.clone());
        self.id_index.push(id);

        if adaptive_binary {
            let data = &self.data;
            for index in self.binary_indices.values_mut() {
                let path = CompiledPath::compile(index.property());
                index.insert_adaptive(position, &|p| path.get_scalar(&data[p]));
            }
        } else {
            for index in self.binary_indices.values_mut() {
                index.mark_dirty();
            }
        }

        for view in &mut self.dynamic_views {
            view.evaluate_document(&self.data, position, true);
        }

        Ok(doc)
    }

    /// Inserts one document, returning the stored copy (with `$id`/`meta`
    /// stamped on).
    pub fn insert(&mut self, doc: Value) -> CollectionResult<Value> {
        self.insert_single(doc, self.options.adaptive_binary_indices)
    }

    /// Bulk insert: adaptive binary maintenance is suspended during the
    /// batch and every configured index is rebuilt once at the end.
    pub fn insert_many(&mut self, docs: Vec<Value>) -> CollectionResult<Vec<Value>> {
        let mut inserted = Vec::with_capacity(docs.len());
        for doc in docs {
            inserted.push(self.insert_single(doc, false)?);
        }
        if self.options.adaptive_binary_indices {
            let properties: Vec<String> = self.binary_indices.keys().cloned().collect();
            for property in properties {
                self.ensure_index(&property, true);
            }
        }
        Ok(inserted)
    }

    /// Updates a document identified by its own `$id` field.
    pub fn update(&mut self, mut new_doc: Value) -> CollectionResult<Value> {
        let id = document::get_id(&new_doc).ok_or(CollectionError::UnsyncedDocument)?;
        let position = self.position_of(id).ok_or(CollectionError::NotFound(id))?;
        let old_doc = self.data[position].clone();

        for field in &self.options.unique {
            let new_value = new_doc.get(field).cloned().unwrap_or(Value::Null);
            if let Some(index) = self.unique_constraints.get(field) {
                if let Some(existing) = index.get(&new_value) {
                    if existing != position {
                        return Err(CollectionError::DuplicateKey {
                            field: field.clone(),
                            value: new_value.to_string(),
                        });
                    }
                }
            }
        }

        if !self.options.disable_meta {
            let mut meta = document::get_meta(&old_doc).unwrap_or_else(|| Meta::new(Utc::now()));
            meta.touch(Utc::now());
            document::set_meta(&mut new_doc, &meta);
        }
        document::set_id(&mut new_doc, id);

        for field in self.options.unique.clone() {
            let old_value = old_doc.get(&field).cloned().unwrap_or(Value::Null);
            let new_value = new_doc.get(&field).cloned().unwrap_or(Value::Null);
            self.unique_constraints
                .get_mut(&field)
                .expect("constructed from options.unique")
                .update(&old_value, &new_value, position)
                .expect("pre-checked for conflicts");
        }
        for field in self.options.exact.clone() {
            let old_value = old_doc.get(&field).cloned().unwrap_or(Value::Null);
            let new_value = new_doc.get(&field).cloned().unwrap_or(Value::Null);
            self.exact_constraints
                .get_mut(&field)
                .expect("constructed from options.exact")
                .update(&old_value, &new_value, position);
        }

        self.data[position] = new_doc.clone();

        if self.options.adaptive_binary_indices {
            let data = &self.data;
            for index in self.binary_indices.values_mut() {
                let path = CompiledPath::compile(index.property());
                let old_value = path.get_scalar(&old_doc);
                index.reposition_adaptive(position, &old_value, &|p| path.get_scalar(&data[p]));
            }
        } else {
            for index in self.binary_indices.values_mut() {
                index.mark_dirty();
            }
        }

        for view in &mut self.dynamic_views {
            view.evaluate_document(&self.data, position, false);
        }

        Ok(new_doc)
    }

    /// Removes the document carrying `$id`.
    pub fn remove(&mut self, doc: &Value) -> CollectionResult<Value> {
        let id = document::get_id(doc).ok_or(CollectionError::UnsyncedDocument)?;
        self.remove_by_id(id)
    }

    pub fn remove_by_id(&mut self, id: u64) -> CollectionResult<Value> {
        let position = self.position_of(id).ok_or(CollectionError::NotFound(id))?;
        let mut removed = self.remove_batch_by_positions(&[position])?;
        Ok(removed.remove(0))
    }

    /// Removes a set of positions in one batch: dynamic views are
    /// notified with the full set before any index compaction, matching
    /// spec.md §5's batch-remove ordering guarantee.
    pub fn remove_batch_by_positions(&mut self, positions: &[usize]) -> CollectionResult<Vec<Value>> {
        let mut sorted = positions.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.is_empty() {
            return Ok(Vec::new());
        }

        for view in &mut self.dynamic_views {
            view.remove_document(&sorted);
        }

        if self.options.adaptive_binary_indices {
            for index in self.binary_indices.values_mut() {
                index.remove_batch(&sorted);
            }
        } else {
            for index in self.binary_indices.values_mut() {
                index.mark_dirty();
            }
        }

        let unique_fields = self.options.unique.clone();
        let exact_fields = self.options.exact.clone();
        let mut removed_docs = Vec::with_capacity(sorted.len());
        for &position in sorted.iter().rev() {
            let doc = self.data[position].clone();
            for field in &unique_fields {
                let value = doc.get(field).cloned().unwrap_or(Value::Null);
                if let Some(index) = self.unique_constraints.get_mut(field) {
                    index.remove(&value, position);
                    index.shift_after_removal(position);
                }
            }
            for field in &exact_fields {
                let value = doc.get(field).cloned().unwrap_or(Value::Null);
                if let Some(index) = self.exact_constraints.get_mut(field) {
                    index.remove(&value, position);
                    index.shift_after_removal(position);
                }
            }
            self.data.remove(position);
            self.id_index.remove(position);
            removed_docs.push(doc);
        }
        removed_docs.reverse();
        Ok(removed_docs)
    }

    /// Applies `f` to every document at `positions`, then runs it back
    /// through the same update path (unique/binary maintenance,
    /// notifications).
    pub fn update_by_positions<F>(&mut self, positions: &[usize], mut f: F) -> CollectionResult<()>
    where
        F: FnMut(&mut Value),
    {
        for &position in positions {
            let mut doc = self
                .data
                .get(position)
                .cloned()
                .ok_or_else(|| CollectionError::invalid_argument("position out of range"))?;
            f(&mut doc);
            self.update(doc)?;
        }
        Ok(())
    }

    // ---- TTL -------------------------------------------------------------

    /// Sweeps documents whose `meta.updated` is older than `ttl.age`
    /// relative to `now`. No-op if TTL is not configured.
    pub fn ttl_sweep(&mut self, now: DateTime<Utc>) -> CollectionResult<usize> {
        let Some(age) = self.options.ttl.age else {
            return Ok(0);
        };
        let expired: Vec<usize> = self
            .data
            .iter()
            .enumerate()
            .filter(|(_, doc)| document::ttl_reference(doc).map(|ts| now - ts > age).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        let count = expired.len();
        if count > 0 {
            let removed = count.to_string();
            Logger::log(Severity::Info, "ttl.sweep", &[("removed", removed.as_str())]);
            self.remove_batch_by_positions(&expired)?;
        }
        Ok(count)
    }

    // ---- dynamic views ---------------------------------------------------

    pub fn add_dynamic_view(&mut self, name: impl Into<String>) -> &mut DynamicView {
        let mut view = DynamicView::new(name);
        view.rematerialize(&self.data);
        self.dynamic_views.push(view);
        self.dynamic_views.last_mut().expect("just pushed")
    }

    pub fn dynamic_view(&self, name: &str) -> Option<&DynamicView> {
        self.dynamic_views.iter().find(|v| v.name() == name)
    }

    pub fn dynamic_view_mut(&mut self, name: &str) -> Option<&mut DynamicView> {
        self.dynamic_views.iter_mut().find(|v| v.name() == name)
    }

    pub fn remove_dynamic_view(&mut self, name: &str) {
        self.dynamic_views.retain(|v| v.name() != name);
    }

    // ---- transforms --------------------------------------------------

    pub fn set_transform(&mut self, name: impl Into<String>, steps: Vec<TransformStep>) {
        self.transforms.insert(name.into(), steps);
    }

    pub fn transform(&self, name: &str) -> Option<&[TransformStep]> {
        self.transforms.get(name).map(Vec::as_slice)
    }

    /// Runs a named transform: clones its steps, substitutes
    /// `[%lktxp]<name>` parameter tokens, then folds them over a
    /// `Resultset` in order, narrowing the working position set at
    /// `Find`/`Where`/`Simplesort`/`Compoundsort`/`Limit`/`Offset` and
    /// routing `Update`/`Remove` through the matching `_by_positions`
    /// mutator against the positions accumulated so far. Returns the
    /// final matched documents.
    pub fn apply_transform(&mut self, name: &str, params: &HashMap<String, Value>) -> CollectionResult<Vec<Value>> {
        let steps = self
            .transforms
            .get(name)
            .cloned()
            .ok_or_else(|| CollectionError::transform_error(format!("no transform named '{name}'")))?;
        let steps = transform::substitute_steps(&steps, params);

        let mut positions: Option<Vec<usize>> = None;
        for step in steps {
            match step {
                TransformStep::Find(query) => {
                    let compiled = Query::compile(&query).map_err(|e| CollectionError::transform_error(e.to_string()))?;
                    let rs = Resultset::seeded(self, positions.take().unwrap_or_else(|| (0..self.len()).collect()));
                    positions = Some(rs.find_query(compiled).resolved_positions());
                }
                TransformStep::Where(predicate) => {
                    let rs = Resultset::seeded(self, positions.take().unwrap_or_else(|| (0..self.len()).collect()));
                    positions = Some(rs.where_fn(|doc| (predicate.0)(doc)).resolved_positions());
                }
                TransformStep::Simplesort { property, descending } => {
                    let rs = Resultset::seeded(self, positions.take().unwrap_or_else(|| (0..self.len()).collect()));
                    positions = Some(rs.simplesort(&property, descending).resolved_positions());
                }
                TransformStep::Compoundsort(properties) => {
                    let rs = Resultset::seeded(self, positions.take().unwrap_or_else(|| (0..self.len()).collect()));
                    positions = Some(rs.compoundsort(&properties).resolved_positions());
                }
                TransformStep::Limit(n) => {
                    let rs = Resultset::seeded(self, positions.take().unwrap_or_else(|| (0..self.len()).collect()));
                    positions = Some(rs.limit(n).resolved_positions());
                }
                TransformStep::Offset(n) => {
                    let rs = Resultset::seeded(self, positions.take().unwrap_or_else(|| (0..self.len()).collect()));
                    positions = Some(rs.offset(n).resolved_positions());
                }
                TransformStep::Update(f) => {
                    let current = positions.clone().unwrap_or_else(|| (0..self.len()).collect());
                    self.update_by_positions(&current, |doc| f(doc))?;
                    positions = Some(current);
                }
                TransformStep::Remove => {
                    let current = positions.take().unwrap_or_else(|| (0..self.len()).collect());
                    self.remove_batch_by_positions(&current)?;
                    positions = Some(Vec::new());
                }
            }
        }

        let final_positions = positions.unwrap_or_else(|| (0..self.len()).collect());
        Ok(final_positions.iter().map(|&p| self.data[p].clone()).collect())
    }

    // ---- transactions --------------------------------------------------

    pub fn start_transaction(&mut self) {
        self.transaction = Some(TransactionSnapshot {
            data: self.data.clone(),
            id_index: self.id_index.clone(),
            max_id: self.max_id,
            binary_indices: self.binary_indices.clone(),
            unique_constraints: self.unique_constraints.clone(),
            exact_constraints: self.exact_constraints.clone(),
            dynamic_views: self.dynamic_views.clone(),
        });
    }

    pub fn commit_transaction(&mut self) {
        self.transaction = None;
    }

    pub fn rollback_transaction(&mut self) {
        if let Some(snapshot) = self.transaction.take() {
            self.data = snapshot.data;
            self.id_index = snapshot.id_index;
            self.max_id = snapshot.max_id;
            self.binary_indices = snapshot.binary_indices;
            self.unique_constraints = snapshot.unique_constraints;
            self.exact_constraints = snapshot.exact_constraints;
            self.dynamic_views = snapshot.dynamic_views;
        }
    }
}
