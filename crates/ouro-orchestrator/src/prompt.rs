//! Prompt composer for generation requests
//!
//! Builds the full instruction text for one generation call:
//! - The fixed coding rules every program must follow
//! - The task (author mode)
//! - The broken code and its error (repair mode and reflexion retries)

use ouro_core::{GenerationRequest, Mode};

/// Rules embedded in every prompt
const CODING_RULES: &[&str] = &[
    "If using matplotlib, you MUST write exactly this sequence:\n  import matplotlib\n  matplotlib.use('Agg')\n  import matplotlib.pyplot as plt",
    "3D RULE: For 3D plots, pass colour arrays to `ax.scatter(c=array)`. Do NOT use `ax.plot(c=array)`.",
    "VISUALS: If creating an image, save it as a PNG file (e.g. 'chart.png'). DO NOT call `plt.show()` or open any window.",
    "NUMPY RULE: Verify array shapes. Do NOT use `len()` on scalar numpy types (float64).",
    "DECORATOR RULE: Wrappers MUST accept `*args` and `**kwargs`.",
    "OUTPUT RULE: Silent success is failure. PROVE your work by printing the final result or saving a plot.",
    "ALIAS RULE: Do NOT write `import plt`. Use `import matplotlib.pyplot as plt`.",
    "IMPORT RULE: Do NOT import imaginary modules (e.g. 'shift', 'utils'). Only use the standard library or packages installable from PyPI.",
    "LOGIC RULE: Keep coordinate tuples consistent. Do not mix 2D and 3D coordinates in one call.",
    "INTERACTION RULE: Programs must be deterministic and non-interactive. Never read from stdin. If asked for a game, write a fixed 500-step simulation and print the results.",
    "PRINT ALL OUTPUTS TO STDOUT.",
];

const HEADLESS_PREAMBLE: &str =
    "You MUST start your code with:\nimport matplotlib\nmatplotlib.use('Agg')\n\n";

/// Whether the request is likely to produce plotting code
fn mentions_plotting(request: &GenerationRequest) -> bool {
    [
        Some(request.task_text.as_str()),
        request.prior_code.as_deref(),
        request.prior_error_context.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|text| {
        let lower = text.to_lowercase();
        lower.contains("matplotlib") || lower.contains("plot")
    })
}

/// Build the prompt text for a generation request
pub fn compose(request: &GenerationRequest) -> String {
    let mut prompt = String::new();

    if mentions_plotting(request) {
        prompt.push_str(HEADLESS_PREAMBLE);
    }

    prompt.push_str(
        "You are a professional Python engineer. Return ONLY raw executable code. No markdown fences.\n",
    );
    prompt.push_str("RULES:\n");
    for rule in CODING_RULES {
        prompt.push_str("- ");
        prompt.push_str(rule);
        prompt.push('\n');
    }
    prompt.push('\n');

    let prior_code = request.prior_code.as_deref().unwrap_or_default();
    let prior_error = request.prior_error_context.as_deref().unwrap_or_default();

    match request.mode {
        Mode::Author => {
            prompt.push_str("TASK: ");
            prompt.push_str(&request.task_text);
            prompt.push('\n');
        }
        Mode::Repair if request.reflexion_attempt > 0 => {
            if !request.task_text.is_empty() {
                prompt.push_str("ORIGINAL TASK: ");
                prompt.push_str(&request.task_text);
                prompt.push_str("\n\n");
            }
            prompt.push_str(&format!(
                "REFLEXION ATTEMPT {}\n",
                request.reflexion_attempt
            ));
            prompt.push_str("You wrote this code:\n");
            prompt.push_str(prior_code);
            prompt.push_str("\n\nIt failed with this error:\n");
            prompt.push_str(prior_error);
            prompt.push_str("\n\nFIX THE CODE.\n");
        }
        Mode::Repair => {
            prompt.push_str("DEBUG TASK: Fix this broken code based on the error.\n");
            prompt.push_str("ERROR:\n");
            prompt.push_str(prior_error);
            prompt.push_str("\n\nBROKEN CODE:\n");
            prompt.push_str(prior_code);
            prompt.push('\n');
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use ouro_core::Directive;

    #[test]
    fn test_author_prompt() {
        let request = GenerationRequest::from_directive(&Directive::author("Compute 10 primes"));
        let prompt = compose(&request);

        assert!(prompt.contains("TASK: Compute 10 primes"));
        assert!(prompt.contains("Return ONLY raw executable code"));
        assert!(prompt.contains("Silent success is failure"));
        assert!(prompt.contains("Do NOT write `import plt`"));
        assert!(!prompt.contains("FIX THE CODE"));
        assert!(!prompt.starts_with(HEADLESS_PREAMBLE));
    }

    #[test]
    fn test_plotting_task_gets_headless_preamble() {
        let request =
            GenerationRequest::from_directive(&Directive::author("Plot a sine wave to sine.png"));
        assert!(compose(&request).starts_with(HEADLESS_PREAMBLE));
    }

    #[test]
    fn test_repair_prompt() {
        let directive = Directive::repair("print(x)", "NameError: name 'x' is not defined");
        let prompt = compose(&GenerationRequest::from_directive(&directive));

        assert!(prompt.contains("DEBUG TASK: Fix this broken code"));
        assert!(prompt.contains("ERROR:\nNameError: name 'x' is not defined"));
        assert!(prompt.contains("BROKEN CODE:\nprint(x)"));
        assert!(!prompt.contains("You wrote this code"));
    }

    #[test]
    fn test_reflexion_prompt_keeps_task() {
        let directive = Directive::author("Count words in a sentence");
        let request = GenerationRequest::reflexion(&directive, "pass", "SILENT FAILURE", 2);
        let prompt = compose(&request);

        assert!(prompt.contains("ORIGINAL TASK: Count words in a sentence"));
        assert!(prompt.contains("REFLEXION ATTEMPT 2"));
        assert!(prompt.contains(
            "You wrote this code:\npass\n\nIt failed with this error:\nSILENT FAILURE\n\nFIX THE CODE."
        ));
    }
}
