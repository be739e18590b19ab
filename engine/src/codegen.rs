//! WGSL program assembly from the number-system table.
//!
//! One pass over the table emits, per system, a struct and its arithmetic, then four entry
//! points (space × render mode). Everything else in the program is shared: the uniform
//! block, the chunk table, chunk load/store, view mapping and coloring.

use std::collections::HashMap;

use hyperorbit_algebra::{Construction, NumberSystem, SystemDef, FLOAT, MAX_DIM, NUMBER_SYSTEMS};
use tracing::debug;

use crate::config::KernelConfig;
use crate::error::CodegenError;
use crate::layout::MAX_CHUNK_BINDINGS;
use crate::options::{KernelVariant, RenderMode, Space};

/// Binding of the uniform block.
pub const BINDING_PARAMS: u32 = 0;
/// Binding of the chunk table.
pub const BINDING_CHUNK_TABLE: u32 = 1;
/// Binding of the first work buffer chunk; the rest follow consecutively.
pub const BINDING_FIRST_CHUNK: u32 = 2;
/// Binding of the output storage texture.
pub const BINDING_OUTPUT: u32 = BINDING_FIRST_CHUNK + MAX_CHUNK_BINDINGS as u32;

/// One compute entry point of a generated program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    /// Variant it implements
    pub variant: KernelVariant,
    /// WGSL function name
    pub name: String,
}

/// A generated program and the settings baked into it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramSource {
    /// WGSL text
    pub text: String,
    /// Entry points, table order
    pub entry_points: Vec<EntryPoint>,
    /// Baked settings
    pub config: KernelConfig,
}

impl ProgramSource {
    /// Entry point for a variant, if generated.
    pub fn entry_point(&self, variant: KernelVariant) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|e| e.variant == variant)
    }
}

/// Generate the program for the built-in table.
pub fn generate(config: &KernelConfig) -> Result<ProgramSource, CodegenError> {
    generate_for(NUMBER_SYSTEMS, config)
}

struct Row<'a> {
    def: &'a SystemDef,
    system: NumberSystem,
    dim: usize,
}

/// Check a table: every element defined earlier (or `real`), unique names, dimensions
/// within a `Number`, and host arithmetic with the same shape for every row.
pub fn validate(table: &[SystemDef]) -> Result<(), CodegenError> {
    resolve(table).map(|_| ())
}

fn resolve(table: &[SystemDef]) -> Result<Vec<Row<'_>>, CodegenError> {
    if table.is_empty() {
        return Err(CodegenError::Empty);
    }
    let mut dims: HashMap<&str, usize> = HashMap::from([("real", 1)]);
    let mut rows = Vec::with_capacity(table.len());
    for def in table {
        if dims.contains_key(def.name) {
            return Err(CodegenError::Duplicate { system: def.name.to_string() });
        }
        let Some(&element_dim) = dims.get(def.element) else {
            return Err(CodegenError::UnknownElement {
                system: def.name.to_string(),
                element: def.element.to_string(),
            });
        };
        let dim = 2 * element_dim;
        if dim > MAX_DIM {
            return Err(CodegenError::TooWide { system: def.name.to_string(), dim, max: MAX_DIM });
        }
        let system = NumberSystem::from_name(def.name)
            .filter(|s| s.dim() == dim && s.construction() == def.construction)
            .ok_or_else(|| CodegenError::NoHostArithmetic { system: def.name.to_string() })?;
        dims.insert(def.name, dim);
        rows.push(Row { def, system, dim });
    }
    Ok(rows)
}

/// Generate a program for an explicit table.
pub fn generate_for(
    table: &[SystemDef],
    config: &KernelConfig,
) -> Result<ProgramSource, CodegenError> {
    let [wx, wy] = config.workgroup;
    if wx == 0 || wy == 0 {
        return Err(CodegenError::Workgroup(config.workgroup));
    }
    let rows = resolve(table)?;
    let defs: HashMap<&str, &SystemDef> = table.iter().map(|d| (d.name, d)).collect();

    let mut text = String::with_capacity(64 * 1024);
    text.push_str(&prelude(config));
    text.push_str(REAL_ARITHMETIC);
    let mut entry_points = Vec::new();
    for row in &rows {
        text.push_str(&system_arithmetic(row.def, &defs));
        for variant in KernelVariant::for_system(row.system) {
            let name = variant.entry_point();
            text.push_str(&entry_point(&name, variant, row.def.name, config));
            entry_points.push(EntryPoint { variant, name });
        }
        debug!(system = row.def.name, dim = row.dim, "generated kernels");
    }
    Ok(ProgramSource { text, entry_points, config: *config })
}

/// WGSL type of a system: `f32` for reals, else the capitalized name.
fn type_name(name: &str) -> String {
    if name == "real" {
        return FLOAT.to_string();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn system_dim(name: &str, defs: &HashMap<&str, &SystemDef>) -> usize {
    match defs.get(name) {
        Some(def) => 2 * system_dim(def.element, defs),
        None => 1,
    }
}

/// Constructor expression reading a system value out of `raw` at `offset`.
fn raw_constructor(name: &str, offset: usize, defs: &HashMap<&str, &SystemDef>) -> String {
    match defs.get(name) {
        None => format!("raw[{offset}]"),
        Some(def) => {
            let half = system_dim(def.element, defs);
            format!(
                "{}({}, {})",
                type_name(name),
                raw_constructor(def.element, offset, defs),
                raw_constructor(def.element, offset + half, defs)
            )
        }
    }
}

/// Field paths of every real component, in raw order.
fn raw_paths(name: &str, prefix: &str, defs: &HashMap<&str, &SystemDef>, out: &mut Vec<String>) {
    match defs.get(name) {
        None => out.push(prefix.to_string()),
        Some(def) => {
            raw_paths(def.element, &format!("{prefix}.x"), defs, out);
            raw_paths(def.element, &format!("{prefix}.y"), defs, out);
        }
    }
}

fn prelude(config: &KernelConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "// Generated kernel program: {} systems, function {}.\n\n",
        NUMBER_SYSTEMS.len(),
        config.function.name()
    ));
    out.push_str(STRUCTS);
    out.push_str(&format!(
        "const ESCAPE_THRESHOLD: f32 = {:?};\nconst LN_2: f32 = 0.6931472;\nconst TAU: f32 = 6.2831855;\n\n",
        config.escape_threshold
    ));
    out.push_str(&format!(
        "@group(0) @binding({BINDING_PARAMS}) var<uniform> params: Params;\n\
         @group(0) @binding({BINDING_CHUNK_TABLE}) var<storage, read> chunk_table: ChunkTable;\n"
    ));
    for k in 0..MAX_CHUNK_BINDINGS {
        out.push_str(&format!(
            "@group(0) @binding({}) var<storage, read_write> chunk_{k}: array<WorkCell>;\n",
            BINDING_FIRST_CHUNK as usize + k
        ));
    }
    out.push_str(&format!(
        "@group(0) @binding({BINDING_OUTPUT}) var output: texture_storage_3d<rgba8unorm, write>;\n\n"
    ));
    out.push_str(&chunk_access());
    out.push_str(SHARED_HELPERS);
    out
}

fn chunk_access() -> String {
    let last = MAX_CHUNK_BINDINGS - 1;
    let mut load = String::new();
    let mut store = String::new();
    for k in 0..last {
        load.push_str(&format!("        case {k}u: {{ cell = chunk_{k}[slot]; }}\n"));
        store.push_str(&format!("        case {k}u: {{ chunk_{k}[slot] = cell; }}\n"));
    }
    load.push_str(&format!("        default: {{ cell = chunk_{last}[slot]; }}\n"));
    store.push_str(&format!("        default: {{ chunk_{last}[slot] = cell; }}\n"));
    format!(
        "fn load_cell(index: u32) -> WorkCell {{\n\
         \x20   let chunk = index / chunk_table.capacity;\n\
         \x20   let slot = index % chunk_table.capacity;\n\
         \x20   var cell: WorkCell;\n\
         \x20   switch chunk {{\n{load}    }}\n\
         \x20   return cell;\n\
         }}\n\n\
         fn store_cell(index: u32, cell: WorkCell) {{\n\
         \x20   let chunk = index / chunk_table.capacity;\n\
         \x20   let slot = index % chunk_table.capacity;\n\
         \x20   switch chunk {{\n{store}    }}\n\
         }}\n\n"
    )
}

fn system_arithmetic(def: &SystemDef, defs: &HashMap<&str, &SystemDef>) -> String {
    let s = def.name;
    let e = def.element;
    let t = type_name(s);
    let te = type_name(e);
    let (conj, mul, sqr) = match def.construction {
        Construction::CayleyDickson => (
            format!("{t}(conj_{e}(v.x), neg_{e}(v.y))"),
            format!(
                "{t}(sub_{e}(mul_{e}(v.x, w.x), mul_{e}(conj_{e}(w.y), v.y)), \
                 add_{e}(mul_{e}(w.y, v.x), mul_{e}(v.y, conj_{e}(w.x))))"
            ),
            format!(
                "{t}(sub_{e}(sqr_{e}(v.x), mul_{e}(conj_{e}(v.y), v.y)), \
                 add_{e}(mul_{e}(v.y, v.x), mul_{e}(v.y, conj_{e}(v.x))))"
            ),
        ),
        Construction::Multicomplex => (
            "v".to_string(),
            format!(
                "{t}(sub_{e}(mul_{e}(v.x, w.x), mul_{e}(w.y, v.y)), \
                 add_{e}(mul_{e}(w.y, v.x), mul_{e}(v.y, w.x)))"
            ),
            format!("{t}(sub_{e}(sqr_{e}(v.x), sqr_{e}(v.y)), scale_{e}(mul_{e}(v.x, v.y), 2.0))"),
        ),
    };

    let mut paths = Vec::new();
    raw_paths(s, "v", defs, &mut paths);
    let stores: String =
        paths.iter().enumerate().map(|(i, p)| format!("    raw[{i}] = {p};\n")).collect();

    format!(
        "// {s}: {construction} double of {e}\n\
         struct {t} {{\n    x: {te},\n    y: {te},\n}}\n\n\
         fn zero_{s}() -> {t} {{ return {t}(zero_{e}(), zero_{e}()); }}\n\
         fn neg_{s}(v: {t}) -> {t} {{ return {t}(neg_{e}(v.x), neg_{e}(v.y)); }}\n\
         fn add_{s}(v: {t}, w: {t}) -> {t} {{ return {t}(add_{e}(v.x, w.x), add_{e}(v.y, w.y)); }}\n\
         fn sub_{s}(v: {t}, w: {t}) -> {t} {{ return {t}(sub_{e}(v.x, w.x), sub_{e}(v.y, w.y)); }}\n\
         fn scale_{s}(v: {t}, k: f32) -> {t} {{ return {t}(scale_{e}(v.x, k), scale_{e}(v.y, k)); }}\n\
         fn conj_{s}(v: {t}) -> {t} {{ return {conj}; }}\n\
         fn mul_{s}(v: {t}, w: {t}) -> {t} {{ return {mul}; }}\n\
         fn sqr_{s}(v: {t}) -> {t} {{ return {sqr}; }}\n\
         fn modulus_sq_{s}(v: {t}) -> f32 {{ return modulus_sq_{e}(v.x) + modulus_sq_{e}(v.y); }}\n\
         fn from_raw_{s}(raw: array<f32, {MAX_DIM}>) -> {t} {{ return {ctor}; }}\n\
         fn to_raw_{s}(v: {t}) -> array<f32, {MAX_DIM}> {{\n\
         \x20   var raw: array<f32, {MAX_DIM}>;\n{stores}    return raw;\n}}\n\n",
        construction = def.construction.name(),
        ctor = raw_constructor(s, 0, defs),
    )
}

fn entry_point(name: &str, variant: KernelVariant, s: &str, config: &KernelConfig) -> String {
    let [wx, wy] = config.workgroup;
    let step = config.function.wgsl(s);
    let (z0, c) = match variant.space {
        Space::Phase => ("mapped", "held"),
        Space::Dynamical => ("held", "mapped"),
    };
    let (condition, after_step, finish) = match variant.mode {
        RenderMode::Escape => (
            format!("i >= params.max_iteration || modulus_sq_{s}(z) >= ESCAPE_THRESHOLD"),
            String::new(),
            format!(
                "    textureStore(output, vec3<i32>(gid), escape_color(modulus_sq_{s}(z), i));\n"
            ),
        ),
        RenderMode::Translated => (
            "i >= params.max_iteration".to_string(),
            format!("        scatter(to_raw_{s}(z), gid, dims);\n"),
            String::new(),
        ),
    };
    format!(
        "@compute @workgroup_size({wx}, {wy}, 1)\n\
         fn {name}(@builtin(global_invocation_id) gid: vec3<u32>) {{\n\
         \x20   let dims = params.extent.xyz;\n\
         \x20   if (gid.x >= dims.x || gid.y >= dims.y || gid.z >= dims.z) {{\n\
         \x20       return;\n\
         \x20   }}\n\
         \x20   if (params.max_iteration <= params.last_iteration) {{\n\
         \x20       return;\n\
         \x20   }}\n\
         \x20   let index = cell_index(gid, dims);\n\
         \x20   let mapped = from_raw_{s}(forward_view(gid, dims));\n\
         \x20   let held = from_raw_{s}(parameter_raw());\n\
         \x20   let c = {c};\n\
         \x20   var z = {z0};\n\
         \x20   var i = 0u;\n\
         \x20   if (params.last_iteration != 0u) {{\n\
         \x20       let saved = load_cell(index);\n\
         \x20       z = from_raw_{s}(saved.value);\n\
         \x20       i = saved.iteration;\n\
         \x20   }}\n\
         \x20   loop {{\n\
         \x20       if ({condition}) {{\n\
         \x20           break;\n\
         \x20       }}\n\
         \x20       z = {step};\n\
         \x20       i = i + 1u;\n\
         {after_step}\
         \x20   }}\n\
         \x20   store_cell(index, WorkCell(to_raw_{s}(z), i));\n\
         {finish}\
         }}\n\n"
    )
}

const STRUCTS: &str = "struct Params {
    center: array<vec4<f32>, 2>,
    parameter: array<vec4<f32>, 2>,
    mapping: vec4<i32>,
    extent: vec4<u32>,
    zoom: f32,
    last_iteration: u32,
    max_iteration: u32,
    global_max: u32,
    pad: vec4<u32>,
}

struct ChunkTable {
    capacity: u32,
    count: u32,
    total: u32,
    pad: u32,
}

struct WorkCell {
    value: array<f32, 8>,
    iteration: u32,
}

";

const SHARED_HELPERS: &str = "fn center_raw() -> array<f32, 8> {
    let lo = params.center[0];
    let hi = params.center[1];
    return array<f32, 8>(lo.x, lo.y, lo.z, lo.w, hi.x, hi.y, hi.z, hi.w);
}

fn parameter_raw() -> array<f32, 8> {
    let lo = params.parameter[0];
    let hi = params.parameter[1];
    return array<f32, 8>(lo.x, lo.y, lo.z, lo.w, hi.x, hi.y, hi.z, hi.w);
}

fn cell_index(loc: vec3<u32>, dims: vec3<u32>) -> u32 {
    return (loc.z * dims.y + loc.y) * dims.x + loc.x;
}

fn axis_coord(loc: u32, span: u32) -> f32 {
    return f32(loc) / f32(span) * 2.0 - 1.0;
}

fn forward_view(loc: vec3<u32>, dims: vec3<u32>) -> array<f32, 8> {
    var raw = center_raw();
    for (var axis = 0u; axis < 3u; axis = axis + 1u) {
        let m = params.mapping[axis];
        if (m != 0) {
            let comp = u32(abs(m)) - 1u;
            raw[comp] = sign(f32(m)) * params.zoom * axis_coord(loc[axis], dims[axis]) + raw[comp];
        }
    }
    return raw;
}

fn component_of(m: i32) -> u32 {
    return select(0u, u32(abs(m)) - 1u, m != 0);
}

fn reverse_axis(value: f32, origin: f32, m: i32, span: u32) -> f32 {
    if (m == 0) {
        return round(f32(span) / 2.0);
    }
    return round(f32(span) * ((value - origin) / (sign(f32(m)) * params.zoom) + 1.0) / 2.0);
}

fn in_span(coord: f32, span: u32) -> bool {
    return coord >= 0.0 && coord < f32(span);
}

fn colorize(t: f32) -> vec4<f32> {
    let rgb = vec3<f32>(0.5) + 0.5 * cos(TAU * (vec3<f32>(t) + vec3<f32>(0.0, 0.33, 0.67)));
    return vec4<f32>(rgb, 1.0);
}

fn escape_color(modulus_sq: f32, iteration: u32) -> vec4<f32> {
    if (modulus_sq < ESCAPE_THRESHOLD) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }
    let shade = (f32(iteration) - log(log(modulus_sq) / 2.0) + LN_2) / f32(max(params.global_max, 1u));
    return colorize(shade);
}

fn location_color(loc: vec3<u32>, dims: vec3<u32>) -> vec4<f32> {
    let d = vec3<f32>(dims);
    let p = vec3<f32>(loc);
    return vec4<f32>(p.x / d.x, p.z / d.z, p.y / d.y, 8.0 / length(d));
}

fn scatter(value: array<f32, 8>, from_cell: vec3<u32>, dims: vec3<u32>) {
    var raw = value;
    var origin = center_raw();
    let mx = params.mapping.x;
    let my = params.mapping.y;
    let mz = params.mapping.z;
    let ix = component_of(mx);
    let iy = component_of(my);
    let iz = component_of(mz);
    let tx = reverse_axis(raw[ix], origin[ix], mx, dims.x);
    let ty = reverse_axis(raw[iy], origin[iy], my, dims.y);
    let tz = reverse_axis(raw[iz], origin[iz], mz, dims.z);
    if (in_span(tx, dims.x) && in_span(ty, dims.y) && in_span(tz, dims.z)) {
        textureStore(output, vec3<i32>(i32(tx), i32(ty), i32(tz)), location_color(from_cell, dims));
    }
}

";

const REAL_ARITHMETIC: &str = "fn zero_real() -> f32 { return 0.0; }
fn neg_real(v: f32) -> f32 { return -v; }
fn add_real(v: f32, w: f32) -> f32 { return v + w; }
fn sub_real(v: f32, w: f32) -> f32 { return v - w; }
fn scale_real(v: f32, k: f32) -> f32 { return v * k; }
fn conj_real(v: f32) -> f32 { return v; }
fn mul_real(v: f32, w: f32) -> f32 { return v * w; }
fn sqr_real(v: f32) -> f32 { return v * v; }
fn modulus_sq_real(v: f32) -> f32 { return v * v; }

";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(type_name("real"), "f32");
        assert_eq!(type_name("quaternion"), "Quaternion");
    }

    #[test]
    fn raw_layout_is_depth_first() {
        let defs: HashMap<&str, &SystemDef> = NUMBER_SYSTEMS.iter().map(|d| (d.name, d)).collect();
        assert_eq!(
            raw_constructor("quaternion", 0, &defs),
            "Quaternion(Complex(raw[0], raw[1]), Complex(raw[2], raw[3]))"
        );
        let mut paths = Vec::new();
        raw_paths("quaternion", "v", &defs, &mut paths);
        assert_eq!(paths, ["v.x.x", "v.x.y", "v.y.x", "v.y.y"]);
    }
}
