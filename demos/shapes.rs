//! Shapes demo: functions, options, overloads and classes.
//!
//! ```bash
//! RUST_LOG=tclbind=debug cargo run --example shapes
//! ```

use tclbind::prelude::*;

#[derive(Debug, Clone, NativeType)]
struct Circle {
    radius: f64,
}

#[derive(Debug, Clone, NativeType)]
#[tcl(name = "Rect")]
struct Rectangle {
    w: f64,
    h: f64,
}

type Shape = AnyOf<(Handle<Circle>, Handle<Rectangle>)>;

fn area(shape: &Shape) -> Option<f64> {
    shape
        .visit()
        .case(|c: Handle<Circle>| std::f64::consts::PI * c.borrow().radius.powi(2))
        .case(|r: Handle<Rectangle>| r.borrow().w * r.borrow().h)
        .finish()
}

fn register(interp: &Interpreter) -> Result<(), RegistrationError> {
    interp
        .native_class::<Circle>()?
        .constructor(|radius: f64| Circle { radius })?
        .method("radius", |c: &Circle| c.radius)?
        .method("grow", |c: &mut Circle, by: f64| c.radius += by)?;

    interp
        .native_class::<Rectangle>()?
        .constructor(|w: f64, h: Opt<f64>| {
            let h = h.into_option().unwrap_or(w);
            Rectangle { w, h }
        })?
        .method("size", |r: &Rectangle| vec![r.w, r.h])?;

    interp.def("area", |shape: Shape| area(&shape))?;
    interp.def("total_area", |shapes: Rest<Shape>| {
        shapes
            .iter()
            .map(|shape| shape.map(|s| area(&s).unwrap_or(0.0)))
            .sum::<Result<f64, ConversionError>>()
    })?;
    interp.def_with(
        "describe",
        |precision: Getopt<i64>, shape: Shape| {
            let digits = precision.unwrap_or(2).clamp(0, 10) as usize;
            match area(&shape) {
                Some(a) => Ok(format!("{} with area {a:.digits$}", shape.obj().type_name())),
                None => Err(NativeError::invalid_argument("not a shape")),
            }
        },
        options("precision=2"),
    )?;
    interp.def_with(
        "discard",
        |_: Handle<Circle>| (),
        sink(1).usage("discard circle"),
    )?;
    Ok(())
}

fn run(interp: &Interpreter, script: &str) {
    match interp.eval(script) {
        Ok(result) => println!("% {script}\n{}", result.as_string()),
        Err(err) => println!("% {script}\nerror: {err}"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let interp = Interpreter::new();
    if let Err(err) = register(&interp) {
        eprintln!("registration failed: {err}");
        return;
    }

    for script in [
        "set c [Circle 1]",
        "set r [Rect 2 3]",
        "$c grow 1",
        "area $c",
        "total_area $c $r [Rect 4]",
        "describe -precision 4 $r",
        "describe -help",
        "describe 12",
        "$r size",
        "$r spin",
        "discard",
        "discard $c",
        "$c radius",
    ] {
        run(&interp, script);
    }
}
