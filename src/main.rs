extern crate pretty_env_logger;

use std::path::{Path, PathBuf};
use std::process::exit;

use bubble_sheet_omr::{
    debug::debug_image_path,
    interpret::{interpret_pages, AnswerMap, InterpretOptions},
    registration::AlignmentResult,
    template::{available_template_names, template_for_name, Template},
    types::TemplateName,
};
use clap::{arg, command, Command};
use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Serialize)]
struct PageReport<'a> {
    page: usize,
    path: &'a Path,
    template: &'a TemplateName,
    alignment: &'a AlignmentResult,
    answers: &'a AnswerMap,
    answered: usize,
}

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let image_paths = matches
        .get_many::<String>("images")
        .map(|paths| paths.map(PathBuf::from).collect::<Vec<_>>())
        .unwrap_or_default();

    let template = match matches.get_one::<String>("template-file") {
        Some(path) => match Template::from_path(Path::new(path)) {
            Ok(template) => template,
            Err(e) => {
                eprintln!("Error loading template {}: {}", path, e);
                exit(1);
            }
        },
        None => template_for_name(matches.get_one::<String>("template").map(String::as_str)),
    };

    let options = InterpretOptions {
        align: !matches.get_flag("no-align"),
        debug: matches.get_flag("debug"),
        ..InterpretOptions::default()
    };

    let images = match load_images(&image_paths) {
        Ok(images) => images,
        Err((path, e)) => {
            eprintln!("Error opening image {}: {}", path.display(), e);
            exit(1);
        }
    };

    let mut failed = false;
    let results = interpret_pages(&images, &template, &options);
    for (index, (path, result)) in image_paths.iter().zip(results).enumerate() {
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                eprintln!("Error interpreting {}: {}", path.display(), e);
                failed = true;
                continue;
            }
        };

        let debug_images = [
            ("bubbles", &page.debug_image),
            ("alignment", &page.alignment_debug_image),
        ];
        for (label, debug_image) in debug_images {
            if let Some(debug_image) = debug_image {
                let debug_path = debug_image_path(path, label);
                if let Err(e) = debug_image.save(&debug_path) {
                    eprintln!("Error writing {}: {}", debug_path.display(), e);
                }
            }
        }

        let report = PageReport {
            page: index + 1,
            path,
            template: &template.name,
            alignment: &page.alignment,
            answers: &page.answers,
            answered: page.answered_count(),
        };
        match serde_json::to_string(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing result for {}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    if failed {
        exit(1);
    }
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<DynamicImage>, (PathBuf, image::ImageError)> {
    paths
        .par_iter()
        .map(|path| image::open(path).map_err(|e| (path.clone(), e)))
        .collect()
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    command!()
        .arg(
            arg!(-t --template <NAME> "Builtin template name")
                .required(false)
                .value_parser(available_template_names()),
        )
        .arg(
            arg!(--"template-file" <PATH> "Path to a template JSON file")
                .required(false)
                .conflicts_with("template"),
        )
        .arg(arg!(--"no-align" "Skip registration mark alignment"))
        .arg(arg!(-d --debug "Write annotated debug images next to the inputs"))
        .arg(arg!(images: <IMAGE> ... "Paths to page images").required(true))
}
