use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::utils::{
    error::{PlanoResult, ValidationError},
    types::{
        Accumulator, AggregationPipeline, Constraint, FieldPredicate, FieldValue, GroupSpec,
        IndexField, Projection, QueryDescriptor, SortDirection, SortField,
    },
};

/// Trait for compiling raw declarative specs into validated descriptors
pub trait FilterCompiler: Send + Sync {
    /// Compile a raw query spec into a normalized descriptor
    fn compile(&self, raw: &JsonValue) -> PlanoResult<QueryDescriptor>;

    /// Compile a raw aggregation stage array into a pipeline
    fn compile_pipeline(&self, raw: &JsonValue) -> PlanoResult<AggregationPipeline>;

    /// Compile a raw index key spec into an ordered field list
    fn compile_index_keys(&self, raw: &JsonValue) -> PlanoResult<Vec<IndexField>>;
}

/// Default implementation of FilterCompiler.
///
/// Pure and deterministic: the same raw spec always compiles to the same
/// descriptor. Raw specs use the document-store query shape:
///
/// ```json
/// { "filter": {"author": "George Orwell", "published_year": {"$gt": 1950}},
///   "sort": {"title": 1},
///   "projection": {"title": 1, "author": 1, "_id": 0},
///   "skip": 5, "limit": 5 }
/// ```
pub struct DefaultFilterCompiler;

impl DefaultFilterCompiler {
    /// Create a new compiler
    pub fn new() -> Self {
        Self
    }

    fn parse_filter(value: &JsonValue) -> PlanoResult<Vec<FieldPredicate>> {
        let object = value.as_object().ok_or_else(|| {
            ValidationError::InvalidPredicate("filter must be an object".to_string())
        })?;

        // serde_json objects iterate in key order, so the compiled
        // predicate list is sorted by field name without extra work.
        let mut predicate = Vec::with_capacity(object.len());
        for (field, spec) in object {
            predicate.push(FieldPredicate::new(field.clone(), Self::parse_constraints(field, spec)?));
        }
        Ok(predicate)
    }

    fn parse_constraints(field: &str, spec: &JsonValue) -> PlanoResult<Vec<Constraint>> {
        match spec {
            JsonValue::Object(operators) => {
                if operators.is_empty() {
                    return Err(ValidationError::InvalidPredicate(format!(
                        "empty constraint object for field '{}'",
                        field
                    ))
                    .into());
                }

                let mut constraints = Vec::with_capacity(operators.len());
                for (operator, operand) in operators {
                    constraints.push(Self::parse_operator(field, operator, operand)?);
                }
                Ok(constraints)
            }
            JsonValue::Array(_) => Err(ValidationError::InvalidPredicate(format!(
                "array equality is not supported for field '{}'",
                field
            ))
            .into()),
            scalar => {
                let operand = FieldValue::from_json(scalar).ok_or_else(|| {
                    ValidationError::InvalidPredicate(format!(
                        "invalid operand for field '{}'",
                        field
                    ))
                })?;
                Ok(vec![Constraint::Eq(operand)])
            }
        }
    }

    fn parse_operator(field: &str, operator: &str, operand: &JsonValue) -> PlanoResult<Constraint> {
        let scalar = |operand: &JsonValue| -> PlanoResult<FieldValue> {
            FieldValue::from_json(operand).ok_or_else(|| {
                ValidationError::InvalidPredicate(format!(
                    "operator {} on field '{}' requires a scalar operand",
                    operator, field
                ))
                .into()
            })
        };

        match operator {
            "$eq" => Ok(Constraint::Eq(scalar(operand)?)),
            "$gt" => Ok(Constraint::Gt(scalar(operand)?)),
            "$gte" => Ok(Constraint::Gte(scalar(operand)?)),
            "$lt" => Ok(Constraint::Lt(scalar(operand)?)),
            "$lte" => Ok(Constraint::Lte(scalar(operand)?)),
            "$in" => {
                let items = operand.as_array().ok_or_else(|| {
                    ValidationError::InvalidPredicate(format!(
                        "$in on field '{}' requires an array operand",
                        field
                    ))
                })?;
                let mut operands = Vec::with_capacity(items.len());
                for item in items {
                    operands.push(scalar(item)?);
                }
                Ok(Constraint::In(operands))
            }
            other => Err(ValidationError::UnsupportedOperator(other.to_string()).into()),
        }
    }

    /// Sort specs accept two forms: an object (`{"title": 1}`) or an array
    /// of `["field", direction]` pairs. The array form is the one to use
    /// for compound sorts, since JSON object keys carry no reliable order.
    fn parse_sort(value: &JsonValue) -> PlanoResult<Vec<SortField>> {
        match value {
            JsonValue::Object(object) => {
                let mut sort = Vec::with_capacity(object.len());
                for (field, direction) in object {
                    sort.push(SortField {
                        field: field.clone(),
                        direction: Self::parse_direction(field, direction)?,
                    });
                }
                Ok(sort)
            }
            JsonValue::Array(items) => {
                let mut sort = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        JsonValue::Array(pair) if pair.len() == 2 => {
                            let field = pair[0].as_str().ok_or_else(|| {
                                ValidationError::InvalidSort(
                                    "sort pair must start with a field name".to_string(),
                                )
                            })?;
                            sort.push(SortField {
                                field: field.to_string(),
                                direction: Self::parse_direction(field, &pair[1])?,
                            });
                        }
                        JsonValue::Object(object) if object.len() == 1 => {
                            for (field, direction) in object {
                                sort.push(SortField {
                                    field: field.clone(),
                                    direction: Self::parse_direction(field, direction)?,
                                });
                            }
                        }
                        _ => {
                            return Err(ValidationError::InvalidSort(
                                "sort array entries must be [field, direction] pairs".to_string(),
                            )
                            .into())
                        }
                    }
                }
                Ok(sort)
            }
            _ => Err(ValidationError::InvalidSort(
                "sort must be an object or an array of pairs".to_string(),
            )
            .into()),
        }
    }

    fn parse_direction(field: &str, value: &JsonValue) -> PlanoResult<SortDirection> {
        match value.as_i64() {
            Some(1) => Ok(SortDirection::Ascending),
            Some(-1) => Ok(SortDirection::Descending),
            _ => Err(ValidationError::InvalidSort(format!(
                "direction for '{}' must be 1 or -1",
                field
            ))
            .into()),
        }
    }

    fn parse_projection(value: &JsonValue) -> PlanoResult<Option<Projection>> {
        let object = value.as_object().ok_or_else(|| {
            ValidationError::InvalidProjection("projection must be an object".to_string())
        })?;

        if object.is_empty() {
            return Ok(None);
        }

        let mut fields = BTreeSet::new();
        let mut include_id = true;
        for (field, flag) in object {
            let included = match flag {
                JsonValue::Bool(b) => *b,
                JsonValue::Number(n) if n.as_i64() == Some(0) => false,
                JsonValue::Number(n) if n.as_i64() == Some(1) => true,
                _ => {
                    return Err(ValidationError::InvalidProjection(format!(
                        "projection flag for '{}' must be 0 or 1",
                        field
                    ))
                    .into())
                }
            };

            if field == "_id" {
                include_id = included;
            } else if included {
                fields.insert(field.clone());
            } else {
                // Only the identity field has a representable exclusion
                return Err(ValidationError::InvalidProjection(format!(
                    "cannot exclude field '{}'; only _id exclusion is supported",
                    field
                ))
                .into());
            }
        }

        Ok(Some(Projection { fields, include_id }))
    }

    fn parse_skip(value: &JsonValue) -> PlanoResult<u64> {
        match value.as_i64() {
            Some(skip) if skip >= 0 => Ok(skip as u64),
            Some(skip) => Err(ValidationError::NegativeSkip(skip).into()),
            None => {
                Err(ValidationError::InvalidSpec("skip must be an integer".to_string()).into())
            }
        }
    }

    fn parse_limit(value: &JsonValue) -> PlanoResult<u64> {
        match value.as_i64() {
            Some(limit) if limit > 0 => Ok(limit as u64),
            Some(limit) => Err(ValidationError::InvalidLimit(limit).into()),
            None => {
                Err(ValidationError::InvalidSpec("limit must be an integer".to_string()).into())
            }
        }
    }

    fn parse_group(value: &JsonValue) -> PlanoResult<GroupSpec> {
        let object = value.as_object().ok_or_else(|| {
            ValidationError::InvalidPipeline("$group must be an object".to_string())
        })?;

        let group_by = match object.get("_id") {
            Some(JsonValue::String(reference)) if reference.starts_with('$') => {
                reference[1..].to_string()
            }
            _ => {
                return Err(ValidationError::InvalidPipeline(
                    "$group requires an _id field reference like \"$genre\"".to_string(),
                )
                .into())
            }
        };

        let mut accumulators = Vec::new();
        for (name, spec) in object {
            if name == "_id" {
                continue;
            }
            accumulators.push((name.clone(), Self::parse_accumulator(name, spec)?));
        }

        if accumulators.is_empty() {
            return Err(ValidationError::InvalidPipeline(
                "$group requires at least one accumulator".to_string(),
            )
            .into());
        }

        Ok(GroupSpec { group_by, accumulators })
    }

    fn parse_accumulator(name: &str, spec: &JsonValue) -> PlanoResult<Accumulator> {
        let object = match spec.as_object() {
            Some(object) if object.len() == 1 => object,
            _ => {
                return Err(ValidationError::InvalidPipeline(format!(
                    "accumulator '{}' must be a single-operator object",
                    name
                ))
                .into())
            }
        };

        let (operator, operand) = object
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .unwrap_or(("", &JsonValue::Null));

        let field_reference = |operand: &JsonValue| -> PlanoResult<String> {
            match operand {
                JsonValue::String(reference) if reference.starts_with('$') => {
                    Ok(reference[1..].to_string())
                }
                _ => Err(ValidationError::InvalidPipeline(format!(
                    "accumulator '{}' requires a field reference like \"$price\"",
                    name
                ))
                .into()),
            }
        };

        match operator {
            "$sum" => {
                // `{$sum: 1}` is the counting idiom; `{$sum: "$field"}` sums
                if operand.as_i64() == Some(1) {
                    Ok(Accumulator::Count)
                } else {
                    Ok(Accumulator::Sum(field_reference(operand)?))
                }
            }
            "$avg" => Ok(Accumulator::Avg(field_reference(operand)?)),
            "$min" => Ok(Accumulator::Min(field_reference(operand)?)),
            "$max" => Ok(Accumulator::Max(field_reference(operand)?)),
            "$push" => Ok(Accumulator::Push(field_reference(operand)?)),
            other => Err(ValidationError::UnsupportedOperator(other.to_string()).into()),
        }
    }
}

impl Default for DefaultFilterCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterCompiler for DefaultFilterCompiler {
    fn compile(&self, raw: &JsonValue) -> PlanoResult<QueryDescriptor> {
        let object = raw.as_object().ok_or_else(|| {
            ValidationError::NotAnObject(json_type_name(raw).to_string())
        })?;

        let mut descriptor = QueryDescriptor::empty();
        for (key, value) in object {
            match key.as_str() {
                "filter" => descriptor.predicate = Self::parse_filter(value)?,
                "sort" => descriptor.sort = Self::parse_sort(value)?,
                "projection" => descriptor.projection = Self::parse_projection(value)?,
                "skip" => descriptor.skip = Self::parse_skip(value)?,
                "limit" => descriptor.limit = Some(Self::parse_limit(value)?),
                other => {
                    return Err(ValidationError::UnknownSpecField(other.to_string()).into())
                }
            }
        }

        Ok(descriptor)
    }

    fn compile_pipeline(&self, raw: &JsonValue) -> PlanoResult<AggregationPipeline> {
        let stages = raw.as_array().ok_or_else(|| {
            ValidationError::InvalidPipeline("pipeline must be an array of stages".to_string())
        })?;

        let mut filter = Vec::new();
        let mut group: Option<GroupSpec> = None;
        let mut sort = Vec::new();
        let mut limit = None;

        for stage in stages {
            let object = match stage.as_object() {
                Some(object) if object.len() == 1 => object,
                _ => {
                    return Err(ValidationError::InvalidPipeline(
                        "each stage must be a single-operator object".to_string(),
                    )
                    .into())
                }
            };

            let (operator, value) = object
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v))
                .unwrap_or(("", &JsonValue::Null));

            match operator {
                "$match" => {
                    if group.is_some() {
                        return Err(ValidationError::InvalidPipeline(
                            "$match must precede $group".to_string(),
                        )
                        .into());
                    }
                    filter = Self::parse_filter(value)?;
                }
                "$group" => {
                    if group.is_some() {
                        return Err(ValidationError::InvalidPipeline(
                            "only one $group stage is supported".to_string(),
                        )
                        .into());
                    }
                    group = Some(Self::parse_group(value)?);
                }
                "$sort" => {
                    if group.is_none() {
                        return Err(ValidationError::InvalidPipeline(
                            "$sort must follow $group".to_string(),
                        )
                        .into());
                    }
                    sort = Self::parse_sort(value)?;
                }
                "$limit" => {
                    if group.is_none() {
                        return Err(ValidationError::InvalidPipeline(
                            "$limit must follow $group".to_string(),
                        )
                        .into());
                    }
                    limit = Some(Self::parse_limit(value)?);
                }
                other => {
                    return Err(ValidationError::UnsupportedOperator(other.to_string()).into())
                }
            }
        }

        let group = group.ok_or_else(|| {
            ValidationError::InvalidPipeline("pipeline requires a $group stage".to_string())
        })?;

        Ok(AggregationPipeline { filter, group, sort, limit })
    }

    /// Index keys accept the same two forms as sort specs; the array form
    /// preserves compound key order.
    fn compile_index_keys(&self, raw: &JsonValue) -> PlanoResult<Vec<IndexField>> {
        let sort = Self::parse_sort(raw).map_err(|_| {
            ValidationError::InvalidIndexKeys(
                "index keys must map fields to 1 or -1".to_string(),
            )
        })?;

        if sort.is_empty() {
            return Err(ValidationError::InvalidIndexKeys(
                "index keys must name at least one field".to_string(),
            )
            .into());
        }

        Ok(sort
            .into_iter()
            .map(|s| IndexField { field: s.field, direction: s.direction })
            .collect())
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
