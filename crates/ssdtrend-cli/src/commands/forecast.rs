//! `ssdtrend forecast`: one-step-ahead evaluation of an AR(p) model.

use ssdtrend_core::{AutoRegressive, ModelSurface, Transform, evaluate_one_step};

pub struct ForecastCommandConfig<'a> {
    pub path: &'a str,
    pub object: &'a str,
    pub field: &'a str,
    pub config_path: Option<&'a str>,
    pub order: usize,
    pub mp_window: Option<usize>,
    pub horizon: usize,
}

pub fn run(cmd: ForecastCommandConfig<'_>) {
    let config = super::load_config(cmd.config_path);
    let ds = super::read_dataset(cmd.path);
    let uid = super::parse_object_id(cmd.object);

    let surface = ModelSurface::new(&ds, &config).unwrap_or_else(|e| super::fail(&e));
    let transform = match cmd.mp_window {
        Some(window) => Transform::MatrixProfile { window },
        None => Transform::Raw,
    };
    let Some(values) = surface.materialise(uid, cmd.field, transform) else {
        eprintln!("{uid}.{} is not in the dataset", cmd.field);
        std::process::exit(1);
    };

    let split = surface.split(&values);
    if split.degenerate {
        eprintln!(
            "Series of {} value(s) is too short to split {:.1}/{:.1}/{:.1}",
            values.len(),
            config.split.train,
            config.split.validation,
            config.split.test
        );
        std::process::exit(1);
    }

    let mut model = AutoRegressive::new(cmd.order);
    let eval = evaluate_one_step(&mut model, &split).unwrap_or_else(|e| super::fail(&e));

    println!("{uid}.{} ({} values, {:?})", cmd.field, values.len(), transform);
    println!(
        "  split        {} / {} / {}",
        split.train.len(),
        split.validation.len(),
        split.test.len()
    );
    if let Some(coef) = model.coefficients() {
        println!("  coefficients {coef:.4?}");
    }
    println!("  {:<12} validation RMSE {:.4}", eval.model, eval.validation_rmse);
    println!("  {:<12} test RMSE       {:.4}", eval.model, eval.test_rmse);

    if cmd.horizon > 0 {
        match model.forecast(&values, cmd.horizon) {
            Some(ahead) => println!("  next {}: {ahead:.4?}", cmd.horizon),
            None => eprintln!("  history too short for a {}-step forecast", cmd.horizon),
        }
    }
}
