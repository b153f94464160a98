use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use expect_test::expect;
use tempfile::TempDir;
use weft_codegen::{generate, CodegenError, GenerateOptions, BANNER};
use weft_front::DeclError;

/// Relative file path to contents.
type TestProject = HashMap<&'static str, &'static str>;

const GEOMETRY: &str = r#"
[types.Point]
dictionary = { x = { type = "f64", required = true }, y = { type = "f64", default = 0 } }

[types.Unit]
string_enum = ["meters", "feet"]

[functions.distance]
args = [{ name = "a", type = "Point" }, { name = "b", type = "Point" }]
ret = "f64"

[functions.describe]
args = [{ name = "unit", type = { type = "Unit", default = "meters" } }]
ret = "DOMString"

[[functions.parse.variants]]
args = [{ name = "text", type = "DOMString" }]
ret = "any"

[[functions.parse.variants]]
args = [{ name = "value", type = "f64" }]
ret = "any"
"#;

fn setup_project(project: TestProject) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    for (relative, content) in project {
        let path = dir.path().join("src").join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }
    dir
}

fn options(dir: &Path) -> GenerateOptions {
    GenerateOptions {
        source_root: dir.join("src"),
        output_root: dir.join("out"),
        debug: false,
    }
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join("out").join(name)).unwrap_or_else(|err| panic!("cannot read {}: {}", name, err))
}

/// The block opened on the first line containing `start`, through the closing line at the same
/// indentation, with that indentation removed.
fn block(text: &str, start: &str) -> String {
    let mut lines = text.lines().skip_while(|line| !line.contains(start));
    let first = lines.next().unwrap_or_else(|| panic!("no line contains {:?}", start));
    let indent = first.len() - first.trim_start().len();
    let mut out = format!("{}\n", &first[indent..]);
    for line in lines {
        out.push_str(line.get(indent..).unwrap_or(""));
        out.push('\n');
        let depth = line.len() - line.trim_start().len();
        if depth == indent && line.trim_start().starts_with('}') {
            break;
        }
    }
    out
}

fn geometry_project() -> TempDir {
    setup_project(TestProject::from([
        ("geometry.bind.toml", GEOMETRY),
        ("geometry.zig", ""),
    ]))
}

#[test]
fn generates_every_artifact() {
    let dir = geometry_project();
    let report = generate(&options(dir.path())).unwrap();
    assert_eq!(report.declaration_files, 1);
    assert_eq!(report.functions, 3);
    let mut written = report.written.clone();
    written.sort();
    assert_eq!(
        written,
        [
            PathBuf::from("GeneratedBindings.cpp"),
            PathBuf::from("GeneratedGeometry.h"),
            PathBuf::from("bindgen_generated.zig"),
        ]
    );

    let cpp = read(dir.path(), "GeneratedBindings.cpp");
    assert!(cpp.starts_with(BANNER));
    assert!(cpp.contains("namespace Bindgen::Abi {"));
    assert!(cpp.contains("namespace Generated::Geometry {"));
    assert!(cpp.contains("// source: geometry.bind.toml"));
    assert!(cpp.contains("JSC_DEFINE_HOST_FUNCTION(bindgen_Geometry_jsDistance"));
    assert!(cpp.contains("bindgen_Geometry_dispatchDistance0("));

    let header = read(dir.path(), "GeneratedGeometry.h");
    assert!(header.starts_with(BANNER));
    assert!(header.contains("#pragma once"));
    assert!(header.contains("enum class Unit : uint8_t {"));
    assert!(header.contains("struct Point {"));
    assert!(header.contains("extern \"C\" JSC_DECLARE_HOST_FUNCTION(bindgen_Geometry_jsDescribe);"));

    let zig = read(dir.path(), "bindgen_generated.zig");
    assert!(zig.starts_with(BANNER));
    assert!(zig.contains("pub const abi = struct {"));
    assert!(zig.contains("pub const Geometry = struct {"));
    assert!(zig.contains("geometry.zig"));
    assert!(zig.contains("export fn bindgen_Geometry_dispatchDistance0("));
    assert!(zig.contains("impl.distance("));
    assert!(zig.contains("pub fn createDistanceCallback(global: *rt.JSGlobalObject) rt.JSValue {"));
}

#[test]
fn overloads_get_a_runtime_dispatcher() {
    let dir = geometry_project();
    generate(&options(dir.path())).unwrap();

    let cpp = read(dir.path(), "GeneratedBindings.cpp");
    assert!(cpp.contains("size_t argumentCount = callFrame->argumentCount();"));
    assert!(cpp.contains("if (argumentCount >= 1) {"));
    assert!(cpp.contains("return dispatchParse0(global, callFrame);"));
    assert!(cpp.contains("return dispatchParse1(global, callFrame);"));
    assert!(cpp.contains("No overload of parse matches the given arguments"));

    let zig = read(dir.path(), "bindgen_generated.zig");
    assert!(zig.contains("impl.parse0("));
    assert!(zig.contains("impl.parse1("));
}

#[test]
fn second_run_writes_nothing() {
    let dir = geometry_project();
    let first = generate(&options(dir.path())).unwrap();
    assert_eq!(first.written.len(), 3);

    let second = generate(&options(dir.path())).unwrap();
    assert!(second.written.is_empty());
    assert_eq!(second.unchanged.len(), 3);
}

#[test]
fn edited_declarations_rewrite_only_what_changed() {
    let dir = geometry_project();
    generate(&options(dir.path())).unwrap();
    let other = dir.path().join("src/other.bind.toml");
    fs::write(&other, "[functions.ping]\nargs = []\n").unwrap();
    fs::write(dir.path().join("src/other.zig"), "").unwrap();

    let report = generate(&options(dir.path())).unwrap();
    assert!(report.written.contains(&PathBuf::from("GeneratedOther.h")));
    assert!(report.unchanged.contains(&PathBuf::from("GeneratedGeometry.h")));
}

#[test]
fn missing_implementation_fails_before_writing() {
    let dir = setup_project(TestProject::from([
        ("geometry.bind.toml", GEOMETRY),
        ("geometry.zig", ""),
        ("lonely.bind.toml", "[functions.alone]\nargs = []\n"),
    ]));
    let err = generate(&options(dir.path())).unwrap_err();
    assert!(
        matches!(err, CodegenError::Decl(DeclError::MissingPair { .. })),
        "unexpected error: {:?}",
        err
    );
    assert!(!dir.path().join("out").exists());
}

#[test]
fn debug_builds_assert_on_exception_state() {
    let dir = geometry_project();
    let mut options = options(dir.path());
    options.debug = true;
    generate(&options).unwrap();
    let cpp = read(dir.path(), "GeneratedBindings.cpp");
    assert!(cpp.contains("ASSERT_WITH_MESSAGE"));
    let zig = read(dir.path(), "bindgen_generated.zig");
    assert!(zig.contains("rt.hasException"));
}

const SHAPES: &str = r#"
[types.Style]
dictionary = { width = { type = "f64", default = 1 }, label = "DOMString?" }

[functions.scale]
args = [{ name = "factor", type = "f64?" }, { name = "times", type = { type = "f64", default = 2 } }]
ret = "f64"

[functions.plot]
args = [
    { name = "points", type = "sequence<f64>" },
    { name = "labels", type = "record<DOMString>" },
    { name = "mark", type = "oneOf<DOMString, f64>" },
]

[functions.paint]
args = [{ name = "style", type = "Style" }]
"#;

fn shapes_project() -> TempDir {
    setup_project(TestProject::from([("shapes.bind.toml", SHAPES), ("shapes.zig", "")]))
}

#[test]
fn cpp_dispatchers_fill_the_comm_struct() {
    let dir = shapes_project();
    generate(&options(dir.path())).unwrap();
    let cpp = read(dir.path(), "GeneratedBindings.cpp");

    expect![[r#"
        static JSC::EncodedJSValue dispatchScale0(JSC::JSGlobalObject* global, JSC::CallFrame* callFrame)
        {
            auto& vm = JSC::getVM(global);
            auto scope = DECLARE_THROW_SCOPE(vm);
            if (callFrame->argumentCount() < 1) {
                throwVMError(global, scope, JSC::createNotEnoughArgumentsError(global));
                return {};
            }
            Bindgen::Abi::ShapesScaleArguments comm {};
            JSC::JSValue arg0 = callFrame->argument(0);
            if (arg0.isUndefinedOrNull()) {
                comm.factorSet = false;
            } else {
                comm.factorSet = true;
                comm.factor = WebCore::convert<WebCore::IDLUnrestrictedDouble>(*global, arg0);
                RETURN_IF_EXCEPTION(scope, {});
            }
            JSC::JSValue arg1 = callFrame->argument(1);
            double timesValue {};
            if (arg1.isUndefined()) {
                timesValue = 2.0;
            } else {
                timesValue = WebCore::convert<WebCore::IDLUnrestrictedDouble>(*global, arg1);
                RETURN_IF_EXCEPTION(scope, {});
            }
            double result {};
            if (!bindgen_Shapes_dispatchScale0(global, timesValue, &comm, &result)) {
                return {};
            }
            return JSC::JSValue::encode(JSC::jsNumber(result));
        }
    "#]]
    .assert_eq(&block(&cpp, "dispatchScale0(JSC::JSGlobalObject*"));

    expect![[r#"
        static JSC::EncodedJSValue dispatchPlot0(JSC::JSGlobalObject* global, JSC::CallFrame* callFrame)
        {
            auto& vm = JSC::getVM(global);
            auto scope = DECLARE_THROW_SCOPE(vm);
            if (callFrame->argumentCount() < 3) {
                throwVMError(global, scope, JSC::createNotEnoughArgumentsError(global));
                return {};
            }
            Bindgen::Abi::ShapesPlotArguments comm {};
            JSC::JSValue arg0 = callFrame->argument(0);
            Bindgen::Vector<double> pointsStorage;
            bool pointsConverted = Bindgen::convertSequence(global, arg0, pointsStorage, [&](JSC::JSValue item, double& slot) -> bool {
                slot = WebCore::convert<WebCore::IDLUnrestrictedDouble>(*global, item);
                RETURN_IF_EXCEPTION(scope, false);
                return true;
            });
            if (!pointsConverted) {
                return {};
            }
            comm.pointsPtr = pointsStorage.data();
            comm.pointsLen = pointsStorage.size();
            JSC::JSValue arg1 = callFrame->argument(1);
            Bindgen::Vector<Bindgen::BoxedString> labelsKeys;
            Bindgen::Vector<Bindgen::BoxedString> labelsValues;
            bool labelsConverted = Bindgen::convertRecord(global, arg1, labelsKeys, labelsValues, [&](JSC::JSValue item, Bindgen::BoxedString& slot) -> bool {
                slot = Bindgen::toDOMString(global, item);
                RETURN_IF_EXCEPTION(scope, false);
                return true;
            });
            if (!labelsConverted) {
                return {};
            }
            comm.labelsKeys = labelsKeys.data();
            comm.labelsValues = labelsValues.data();
            comm.labelsLen = labelsKeys.size();
            JSC::JSValue arg2 = callFrame->argument(2);
            if (arg2.isString()) {
                comm.markTag = 0;
                comm.markOption0 = Bindgen::toDOMString(global, arg2);
                RETURN_IF_EXCEPTION(scope, {});
            } else if (arg2.isNumber()) {
                comm.markTag = 1;
                comm.markOption1 = WebCore::convert<WebCore::IDLUnrestrictedDouble>(*global, arg2);
                RETURN_IF_EXCEPTION(scope, {});
            } else {
                throwTypeError(global, scope, "Expected string or number for mark"_s);
                return {};
            }
            if (!bindgen_Shapes_dispatchPlot0(global, &comm)) {
                return {};
            }
            return JSC::JSValue::encode(JSC::jsUndefined());
        }
    "#]]
    .assert_eq(&block(&cpp, "dispatchPlot0(JSC::JSGlobalObject*"));

    expect![[r#"
        static JSC::EncodedJSValue dispatchPaint0(JSC::JSGlobalObject* global, JSC::CallFrame* callFrame)
        {
            auto& vm = JSC::getVM(global);
            auto scope = DECLARE_THROW_SCOPE(vm);
            if (callFrame->argumentCount() < 1) {
                throwVMError(global, scope, JSC::createNotEnoughArgumentsError(global));
                return {};
            }
            Bindgen::Abi::ShapesPaintArguments comm {};
            JSC::JSValue arg0 = callFrame->argument(0);
            if (!Generated::Shapes::convertStyle(global, arg0, &comm.style)) {
                return {};
            }
            if (!bindgen_Shapes_dispatchPaint0(global, &comm)) {
                return {};
            }
            return JSC::JSValue::encode(JSC::jsUndefined());
        }
    "#]]
    .assert_eq(&block(&cpp, "dispatchPaint0(JSC::JSGlobalObject*"));
}

#[test]
fn cpp_dictionary_converter_applies_defaults_and_presence() {
    let dir = shapes_project();
    generate(&options(dir.path())).unwrap();
    let cpp = read(dir.path(), "GeneratedBindings.cpp");

    expect![[r#"
        static bool convertStyle(JSC::JSGlobalObject* global, JSC::JSValue value, Bindgen::Abi::Style* out)
        {
            auto& vm = JSC::getVM(global);
            auto scope = DECLARE_THROW_SCOPE(vm);
            JSC::JSObject* object = value.isObject() ? value.getObject() : nullptr;
            if (!object && !value.isUndefinedOrNull()) {
                throwTypeError(global, scope, "Expected an object for Style"_s);
                return false;
            }
            {
                JSC::JSValue field = object ? object->get(global, JSC::Identifier::fromString(vm, "width"_s)) : JSC::jsUndefined();
                RETURN_IF_EXCEPTION(scope, false);
                if (field.isUndefined()) {
                    out->width = 1.0;
                } else {
                    out->width = WebCore::convert<WebCore::IDLUnrestrictedDouble>(*global, field);
                    RETURN_IF_EXCEPTION(scope, false);
                }
            }
            {
                JSC::JSValue field = object ? object->get(global, JSC::Identifier::fromString(vm, "label"_s)) : JSC::jsUndefined();
                RETURN_IF_EXCEPTION(scope, false);
                if (field.isUndefinedOrNull()) {
                    out->labelSet = false;
                } else {
                    out->labelSet = true;
                    out->label = Bindgen::toDOMString(global, field);
                    RETURN_IF_EXCEPTION(scope, false);
                }
            }
            return true;
        }
    "#]]
    .assert_eq(&block(&cpp, "static bool convertStyle("));
}

#[test]
fn zig_dispatchers_unpack_the_comm_struct() {
    let dir = shapes_project();
    generate(&options(dir.path())).unwrap();
    let zig = read(dir.path(), "bindgen_generated.zig");

    expect![[r#"
        pub const Style = struct {
            width: f64 = 1.0,
            label: ?rt.BoxedString = null,

            pub fn fromAbi(raw: *const abi.Style) Style {
                return .{
                    .width = raw.width,
                    .label = if (raw.labelSet) raw.label else null,
                };
            }
        };
    "#]]
    .assert_eq(&block(&zig, "pub const Style = struct {"));

    expect![[r#"
        export fn bindgen_Shapes_dispatchScale0(global: *rt.JSGlobalObject, times: f64, comm: *const abi.ShapesScaleArguments, out: *f64) bool {
            const result = impl.scale(if (comm.factorSet) comm.factor else null, times) catch |err| {
                rt.throwError(global, err);
                return false;
            };
            out.* = result;
            return true;
        }
    "#]]
    .assert_eq(&block(&zig, "export fn bindgen_Shapes_dispatchScale0("));

    expect![[r#"
        export fn bindgen_Shapes_dispatchPlot0(global: *rt.JSGlobalObject, comm: *const abi.ShapesPlotArguments) bool {
            impl.plot(comm.pointsPtr[0..comm.pointsLen], PlotLabels.init(comm.labelsKeys[0..comm.labelsLen], comm.labelsValues[0..comm.labelsLen]), switch (comm.markTag) { 0 => PlotMark{ .option0 = comm.markOption0 }, 1 => PlotMark{ .option1 = comm.markOption1 }, else => unreachable }) catch |err| {
                rt.throwError(global, err);
                return false;
            };
            return true;
        }
    "#]]
    .assert_eq(&block(&zig, "export fn bindgen_Shapes_dispatchPlot0("));

    expect![[r#"
        export fn bindgen_Shapes_dispatchPaint0(global: *rt.JSGlobalObject, comm: *const abi.ShapesPaintArguments) bool {
            impl.paint(Style.fromAbi(&comm.style)) catch |err| {
                rt.throwError(global, err);
                return false;
            };
            return true;
        }
    "#]]
    .assert_eq(&block(&zig, "export fn bindgen_Shapes_dispatchPaint0("));
}

#[test]
fn same_names_in_two_files_stay_apart() {
    let dir = setup_project(TestProject::from([
        (
            "fs.bind.toml",
            "[types.Options]\ndictionary = { recursive = { type = \"boolean\", required = true } }\n\n\
             [functions.read]\nargs = [{ name = \"paths\", type = \"sequence<f64>\" }]\n",
        ),
        ("fs.zig", ""),
        (
            "net.bind.toml",
            "[types.Options]\ndictionary = { port = { type = \"f64\", required = true } }\n\n\
             [functions.read]\nargs = [{ name = \"host\", type = \"DOMString?\" }]\n",
        ),
        ("net.zig", ""),
    ]));
    let report = generate(&options(dir.path())).unwrap();
    assert_eq!(report.declaration_files, 2);

    let cpp = read(dir.path(), "GeneratedBindings.cpp");
    for name in ["FsReadArguments", "NetReadArguments", "Options", "Options2"] {
        assert_eq!(cpp.matches(&format!("struct {} {{", name)).count(), 1, "struct {}", name);
    }
    assert!(cpp.contains("static bool convertOptions(JSC::JSGlobalObject* global, JSC::JSValue value, Bindgen::Abi::Options2* out)"));

    let zig = read(dir.path(), "bindgen_generated.zig");
    let abi = block(&zig, "pub const abi = struct {");
    for name in ["FsReadArguments", "NetReadArguments", "Options", "Options2"] {
        assert_eq!(abi.matches(&format!("pub const {} = extern struct {{", name)).count(), 1, "abi.{}", name);
    }
    assert!(block(&zig, "pub const Fs = struct {").contains("pub fn fromAbi(raw: *const abi.Options) Options {"));
    assert!(block(&zig, "pub const Net = struct {").contains("pub fn fromAbi(raw: *const abi.Options2) Options {"));
}

#[test]
fn keyword_keys_are_renamed_in_cpp_only() {
    let dir = setup_project(TestProject::from([
        (
            "flags.bind.toml",
            "[types.Flags]\ndictionary = { default = { type = \"boolean\", required = true }, content-type = { type = \"DOMString\", required = true } }\n\n\
             [functions.apply]\nargs = [{ name = \"new\", type = \"Flags\" }]\n",
        ),
        ("flags.zig", ""),
    ]));
    generate(&options(dir.path())).unwrap();

    let cpp = read(dir.path(), "GeneratedBindings.cpp");
    assert!(cpp.contains("    bool default_;"));
    assert!(!cpp.contains(" default;"));
    assert!(cpp.contains("out->default_ = "));
    assert!(cpp.contains("JSC::Identifier::fromString(vm, \"default\"_s)"));
    assert!(cpp.contains("out->content_type = "));
    assert!(cpp.contains("JSC::Identifier::fromString(vm, \"content-type\"_s)"));
    assert!(cpp.contains("Bindgen::Abi::Flags new_Value {};"));

    let header = read(dir.path(), "GeneratedFlags.h");
    assert!(header.contains("bool default_;"));
    assert!(header.contains("content_type;"));
    assert!(header.contains("const Bindgen::Abi::Flags* new_)"));

    let zig = read(dir.path(), "bindgen_generated.zig");
    assert!(zig.contains("@\"content-type\""));
}

#[test]
fn nested_artifacts_import_relative_to_their_directory() {
    let dir = setup_project(TestProject::from([
        ("geometry.bind.toml", GEOMETRY),
        ("geometry.zig", ""),
        ("weft.toml", "[output]\nzig_file = \"gen/bindings.zig\"\ncpp_file = \"gen/glue.cpp\"\n"),
    ]));
    generate(&options(dir.path())).unwrap();

    let zig = read(dir.path(), "gen/bindings.zig");
    assert!(zig.contains("const impl = @import(\"../../src/geometry.zig\");"));
    let cpp = read(dir.path(), "gen/glue.cpp");
    assert!(cpp.contains("#include \"../GeneratedGeometry.h\""));
    assert!(dir.path().join("out/GeneratedGeometry.h").is_file());
}
