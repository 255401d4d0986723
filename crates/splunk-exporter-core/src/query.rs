//! SPL query builders.
//!
//! Index and metric names are interpolated verbatim: they come from the
//! operator's configuration and are not escaped.

/// Latest value of `metric`, grouped by every dimension it carries.
///
/// The `mcatalog` subsearch expands to `search="dim1 dim2 ..."`, which
/// splices the metric's dimension names into the `by` clause, so one
/// execution yields one row per dimension combination.
pub fn metric_value_query(index: &str, metric: &str) -> String {
    format!(
        r#"
		| mstats
			latest(_value) as value
			where index="{index}"
				  metric_name="{metric}"
			by metric_name [| mcatalog
				values(_dims) as dimensions
				where index="{index}"
					  metric_name="{metric}"
				| eval search=mvjoin(dimensions, " ")
				| fields search]"#
    )
}

/// One row per distinct dimension name of `metric`, in field `dims`.
pub fn dimension_discovery_query(index: &str, metric: &str) -> String {
    format!(
        r#"
		| mcatalog values(_dims) as dims
		  where index="{index}" metric_name="{metric}"
		  by metric_name
		| fields dims
		| mvexpand dims"#
    )
}
