use crate::pattern::template::{PatternSpec, TemplateSpec, EXTERNAL};

const X: i32 = EXTERNAL;

/// Built-in fusion patterns in priority order.
///
/// Every template refers only to later positions. Composite inputs come out
/// in the reverse order in which external slots appear, and an excluded
/// template counts as an external slot wherever it is referenced.
pub static DEFAULT_PATTERNS: &[PatternSpec] = &[
    // dynamic update slice at a constant offset
    PatternSpec {
        name: "const_slice_update",
        templates: &[
            TemplateSpec::new("DynamicUpdateSlice", &[X, X, 1]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    // dynamic slice at a constant offset
    PatternSpec {
        name: "const_slice",
        templates: &[
            TemplateSpec::new("DynamicSlice", &[X, 1]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "relu",
        templates: &[
            TemplateSpec::new("Maximum", &[X, 1]),
            TemplateSpec::new("Constant", &[]).with_predicate("is_constant_zero"),
        ],
    },
    // 0.5 * tanh(0.5 * x) + 0.5
    PatternSpec {
        name: "sigmoid",
        templates: &[
            TemplateSpec::new("Add", &[4, 1]),
            TemplateSpec::new("Multiply", &[4, 2]),
            TemplateSpec::new("Tanh", &[3]),
            TemplateSpec::new("Multiply", &[4, X]),
            TemplateSpec::new("Constant", &[]).with_predicate("is_constant_half"),
        ],
    },
    // bias add on a convolution, explicit broadcast
    PatternSpec {
        name: "biasadd_broadcast",
        templates: &[
            TemplateSpec::new("Add", &[2, 1]),
            TemplateSpec::new("Call", &[X, X])
                .excluded()
                .with_predicate("is_convolution_call"),
            TemplateSpec::new("Broadcast", &[X]),
        ],
    },
    // bias add on a convolution, implicit broadcast
    PatternSpec {
        name: "biasadd",
        templates: &[
            TemplateSpec::new("Add", &[1, X]),
            TemplateSpec::new("Call", &[X, X])
                .excluded()
                .with_predicate("is_convolution_call"),
        ],
    },
    PatternSpec {
        name: "zero_pad",
        templates: &[
            TemplateSpec::new("Pad", &[X, 1]).with_predicate("is_external_padding"),
            TemplateSpec::new("Constant", &[]).with_predicate("is_constant_zero"),
        ],
    },
    // truncated normal followed by scale and shift
    PatternSpec {
        name: "trunc_norm_scale_add",
        templates: &[
            TemplateSpec::new("Add", &[2, 1]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Multiply", &[4, 3]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("While", &[5]).with_predicate("is_truncated_normal_while"),
            TemplateSpec::new("Rng", &[6, 7]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "trunc_norm",
        templates: &[
            TemplateSpec::new("While", &[1]).with_predicate("is_truncated_normal_while"),
            TemplateSpec::new("Rng", &[2, 3]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "norm_scale_add",
        templates: &[
            TemplateSpec::new("Add", &[2, 1]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Multiply", &[4, 3]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Rng", &[5, 6]).with_predicate("is_random_normal"),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "uniform_scale_add",
        templates: &[
            TemplateSpec::new("Add", &[2, 1]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Multiply", &[4, 3]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Rng", &[5, 6]).with_predicate("is_random_uniform"),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "norm",
        templates: &[
            TemplateSpec::new("Rng", &[1, 2]).with_predicate("is_random_normal"),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "uniform",
        templates: &[
            TemplateSpec::new("Rng", &[1, 2]).with_predicate("is_random_uniform"),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "bernoulli",
        templates: &[
            TemplateSpec::new("Rng", &[1]).with_predicate("is_random_bernoulli"),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "avgpool_valid",
        templates: &[
            TemplateSpec::new("Divide", &[1, 3]).with_predicate("is_average_pool"),
            TemplateSpec::new("ReduceWindow", &[X, 2]).with_predicate("is_reduction_window_nyxc"),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    // the divisor is itself a window sum over a broadcast of ones
    PatternSpec {
        name: "avgpool_same",
        templates: &[
            TemplateSpec::new("Divide", &[1, 3]).with_predicate("is_average_pool"),
            TemplateSpec::new("ReduceWindow", &[X, 2]).with_predicate("is_reduction_window_nyxc"),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Reshape", &[4]),
            TemplateSpec::new("ReduceWindow", &[5, 7]),
            TemplateSpec::new("Broadcast", &[6]),
            TemplateSpec::new("Constant", &[]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "wide_const",
        templates: &[
            TemplateSpec::new("Broadcast", &[1]),
            TemplateSpec::new("Constant", &[]).with_predicate("is_scalar_constant"),
        ],
    },
];

pub fn default_patterns() -> &'static [PatternSpec] {
    DEFAULT_PATTERNS
}
