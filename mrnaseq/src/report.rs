/// The `full` target and the notebook reports rendered after it.
use std::path::Path;
use std::sync::Arc;

use lib_pipeline::{Pipeline, Result, Statement, Task};
use lib_shared::files;

use super::pipeline::{quoted, statement, with_suffix, Setup};
use super::statements;

/// Copy the notebook `template` into the working directory, execute it and render it to html.
pub fn nbconvert_statement(template: &Path) -> Result<Statement> {
    let notebook = files::basename(template);
    let executed = with_suffix(&notebook, ".ipynb", ".nbconvert.ipynb")?;
    statement(
        statements::NBCONVERT,
        &[
            ("template", quoted(template)),
            ("notebook", quoted(&notebook)),
            ("executed", quoted(&executed)),
        ],
    )
}

pub fn register(pipeline: &mut Pipeline, setup: &Arc<Setup>) -> Result<()> {
    pipeline.add(
        Task::new("full")
            .describe("Run the complete pipeline")
            .follows(&["mapping", "summarystats", "readcounts", "readquant", "coverage"]),
    )?;

    pipeline.add({
        let setup = setup.clone();
        Task::new("report")
            .describe("Render the configured Jupyter notebook templates to html")
            .follows(&["full"])
            .body(move |ctx, _| {
                let templates = &setup.params.report.path;
                if templates.is_empty() {
                    warn!(
                        ctx.logger,
                        "Specify Jupyter ipynb template paths as report.path in pipeline.yml \
                         for html report generation"
                    );
                }
                for template in templates {
                    info!(ctx.logger, "Rendering {}", template.display());
                    ctx.run(&nbconvert_statement(template)?)?;
                }
                Ok(())
            })
    })?;

    Ok(())
}
