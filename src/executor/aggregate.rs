//! Aggregation executor with optional single-column grouping.
//!
//! Integer columns support MIN, MAX, SUM, AVG and COUNT; string columns only
//! COUNT. Groups are emitted in the order they were first seen. AVG uses
//! integer division. An empty input yields no rows, grouped or not.

use crate::access::scan::{OpIterator, TupleSource};
use crate::access::schema::{Column, Schema};
use crate::access::tuple::Tuple;
use crate::access::value::{DataType, Value};
use crate::storage::error::{StorageError, StorageResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateOp {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        }
    }

    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "min" => Some(AggregateOp::Min),
            "max" => Some(AggregateOp::Max),
            "sum" => Some(AggregateOp::Sum),
            "avg" => Some(AggregateOp::Avg),
            "count" => Some(AggregateOp::Count),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running state of one integer group.
#[derive(Debug, Clone, Copy)]
struct IntState {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl Default for IntState {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }
}

impl IntState {
    fn merge(&mut self, value: i32) {
        self.count += 1;
        self.sum += value as i64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn result(&self, op: AggregateOp) -> StorageResult<i32> {
        let wide = match op {
            AggregateOp::Min => return Ok(self.min),
            AggregateOp::Max => return Ok(self.max),
            AggregateOp::Count => self.count,
            AggregateOp::Sum => self.sum,
            AggregateOp::Avg => self.sum / self.count.max(1),
        };
        i32::try_from(wide)
            .map_err(|_| StorageError::Unsupported(format!("{} of {} overflows INT", op, wide)))
    }
}

/// Per-group state in first-seen order.
#[derive(Debug)]
struct GroupTable<S> {
    order: Vec<Option<Value>>,
    states: HashMap<Option<Value>, S>,
}

impl<S: Default> GroupTable<S> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn state_mut(&mut self, group: Option<Value>) -> &mut S {
        if !self.states.contains_key(&group) {
            self.order.push(group.clone());
        }
        self.states.entry(group).or_default()
    }

    fn iter(&self) -> impl Iterator<Item = (&Option<Value>, &S)> + '_ {
        self.order
            .iter()
            .filter_map(|g| self.states.get(g).map(|s| (g, s)))
    }
}

/// Accumulates the aggregate, dispatched on the aggregated column's type.
#[derive(Debug)]
enum Aggregator {
    Int(GroupTable<IntState>),
    /// Strings can only be counted
    Str(GroupTable<i64>),
}

impl Aggregator {
    fn for_type(data_type: DataType, op: AggregateOp) -> StorageResult<Self> {
        match data_type {
            DataType::Int32 => Ok(Aggregator::Int(GroupTable::new())),
            DataType::Varchar(_) if op == AggregateOp::Count => {
                Ok(Aggregator::Str(GroupTable::new()))
            }
            DataType::Varchar(_) => Err(StorageError::Unsupported(format!(
                "{} over a string column",
                op
            ))),
        }
    }

    fn merge(&mut self, group: Option<Value>, value: &Value) {
        match self {
            Aggregator::Int(table) => {
                if let Some(n) = value.as_i32() {
                    table.state_mut(group).merge(n);
                }
            }
            Aggregator::Str(table) => *table.state_mut(group) += 1,
        }
    }

    fn results(&self, op: AggregateOp) -> StorageResult<Vec<(Option<Value>, i32)>> {
        match self {
            Aggregator::Int(table) => table
                .iter()
                .map(|(g, s)| -> StorageResult<(Option<Value>, i32)> {
                    Ok((g.clone(), s.result(op)?))
                })
                .collect(),
            Aggregator::Str(table) => table
                .iter()
                .map(|(g, &n)| -> StorageResult<(Option<Value>, i32)> {
                    let n = i32::try_from(n).map_err(|_| {
                        StorageError::Unsupported(format!("COUNT of {} overflows INT", n))
                    })?;
                    Ok((g.clone(), n))
                })
                .collect(),
        }
    }
}

/// Computes one aggregate over the child, optionally grouped by one field.
pub struct Aggregate {
    /// Child operator that produces tuples
    child: Box<dyn OpIterator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    agg_type: DataType,
    /// `(group, aggregate)` or just `(aggregate)`
    schema: Arc<Schema>,
    /// Computed on the first fetch after open or rewind
    results: Option<std::vec::IntoIter<Tuple>>,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> StorageResult<Self> {
        let child_schema = child.schema().clone();
        let agg_type = child_schema.field_type(agg_field)?;
        // Fail at construction rather than on first fetch
        Aggregator::for_type(agg_type, op)?;

        let agg_name = child_schema.field_name(agg_field)?.unwrap_or("null");
        let mut columns = Vec::new();
        if let Some(group_field) = group_field {
            columns.push(child_schema.column(group_field)?.clone());
        }
        columns.push(Column::new(
            Some(format!("{} ({})", op, agg_name)),
            DataType::Int32,
        ));

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            agg_type,
            schema: Arc::new(Schema::from_columns(columns)?),
            results: None,
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn agg_field(&self) -> usize {
        self.agg_field
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    fn compute(&mut self) -> StorageResult<Vec<Tuple>> {
        let mut aggregator = Aggregator::for_type(self.agg_type, self.op)?;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let Some(value) = tuple.field(self.agg_field)? else {
                continue;
            };
            let group = match self.group_field {
                Some(g) => tuple.field(g)?.cloned(),
                None => None,
            };
            aggregator.merge(group, value);
        }

        aggregator
            .results(self.op)?
            .into_iter()
            .map(|(group, aggregate)| -> StorageResult<Tuple> {
                let mut tuple = Tuple::new(self.schema.clone());
                let agg_index = match self.group_field {
                    Some(_) => {
                        if let Some(group) = group {
                            tuple.set_field(0, group)?;
                        }
                        1
                    }
                    None => 0,
                };
                tuple.set_field(agg_index, Value::Int32(aggregate))?;
                Ok(tuple)
            })
            .collect()
    }
}

impl TupleSource for Aggregate {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> StorageResult<()> {
        self.results = None;
        self.child.open()
    }

    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>> {
        if self.results.is_none() {
            self.results = Some(self.compute()?.into_iter());
        }
        Ok(self.results.as_mut().and_then(Iterator::next))
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.results = None;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.results = None;
        self.child.close();
    }
}
