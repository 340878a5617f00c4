//! Role prompts for the planner, architect, coder and reviewer.

use std::path::Path;

use crate::plan::ImplementationTask;
use crate::tools::ToolRegistry;

/// Kind of file a coder step targets, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Markup,
    Style,
    Script,
    Other,
}

impl FileKind {
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("html" | "htm") => Self::Markup,
            Some("css" | "scss" | "sass" | "less") => Self::Style,
            Some("js" | "mjs" | "cjs" | "ts" | "jsx" | "tsx") => Self::Script,
            _ => Self::Other,
        }
    }
}

/// Planner instructions for a user request.
pub fn planner_prompt(user_prompt: &str) -> String {
    format!(
        r#"You are the PLANNER: a senior technical lead who turns a website idea into a complete engineering plan.

## Request

{user_prompt}

## What the plan must cover

1. **Overview** - what is being built, its core features, and the technology stack (plain HTML, CSS and JavaScript unless the request demands otherwise).
2. **Files** - every file the site needs, each with a concrete purpose: pages and the sections they contain, stylesheets and what they style, scripts and the behaviour they implement, plus any data or asset files.
3. **Features** - each requested feature broken into concrete requirements: user interactions, state it keeps, and which other features it depends on.
4. **Technical details** - layout approach, state and data flow, event handling, responsive breakpoints, accessibility (semantic elements, labels, keyboard use, contrast).
5. **Priorities** - what forms the working core and what builds on top of it.

## Visual direction

Aim for a polished, modern look: a deliberate colour palette, gradients instead of flat white backgrounds, depth through shadows, readable typography and smooth transitions.

Be specific. Someone should be able to build the site from this plan without asking a single question. Use short, conventional, project-relative file paths such as "index.html" or "css/styles.css"."#
    )
}

/// Architect instructions for a serialized plan.
pub fn architect_prompt(plan_json: &str) -> String {
    format!(
        r#"You are the ARCHITECT: a lead engineer who converts a project plan into an ordered list of implementation steps for a coder who will see one step at a time.

## Plan

{plan_json}

## Rules

1. **One step per file.** Every file in the plan gets exactly one step that implements it completely.
2. **Order by dependency.** Structure first (HTML defines the ids and classes), then styling (CSS targets them), then behaviour (JavaScript wires them up). A file that uses identifiers from another file comes after it.
3. **Self-contained descriptions.** The coder will not see the plan. Each description must name:
   - the exact element ids and CSS classes to create or target,
   - function and variable names and what each does,
   - the files it links to or depends on and which of their identifiers it uses,
   - layout approach, event listeners, error handling and responsive breakpoints that apply.
4. **Paths.** Use the plan's project-relative paths exactly, without a leading "/" or "./".

Write descriptions detailed enough that implementing them is mechanical."#
    )
}

/// System prompt for every coder step.
pub fn coder_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are the CODER: an expert front-end engineer and visual designer. You implement exactly one file per step inside the project directory.

## Tools

{tool_descriptions}

## Workflow

1. Check existing content (it is included below; use read_file for other files you depend on).
2. Write complete, working code: no placeholders, no TODOs, no elided sections.
3. Save it with write_file, passing the full file content.

## Rules

- The step is NOT complete until write_file has been called. Describing code in your answer does not save it.
- Keep the ids, classes and function names given in the task exactly as written; other files rely on them.
- Make it look premium: never a plain white page, use colour, depth and motion with restraint.
- Every interactive element gets hover, focus and active states.
- The layout must work from small phones to wide desktops.

When the file is written, answer with a one-paragraph summary of what you implemented."#
    )
}

/// Idioms the coder should follow for a given kind of file.
pub fn language_guidance(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Markup => {
            r#"HTML guidance:
- Start with <!DOCTYPE html>, <html lang="en">, UTF-8 charset and a responsive viewport meta tag.
- Use semantic landmarks (header, nav, main, section, footer) and one h1.
- Give every form control a label and every image meaningful alt text.
- Link stylesheets in <head>; load scripts at the end of <body> or with defer.
- Add a web font (e.g. via Google Fonts) that suits the design."#
        }
        FileKind::Style => {
            r#"CSS guidance:
- Define the palette, spacing scale, radii and shadows as custom properties on :root.
- Backgrounds use linear-gradient or radial-gradient, never plain white.
- Layered box-shadows and rounded corners give cards and buttons depth.
- Transitions around 0.3s with a cubic-bezier easing; hover lifts elements with transform.
- Glassmorphism (backdrop-filter with translucent backgrounds) where it fits.
- Flexbox or grid for layout, with mobile-first media queries.
- Visible :focus-visible outlines and an :active pressed state on buttons."#
        }
        FileKind::Script => {
            r#"JavaScript guidance:
- Wait for DOMContentLoaded (or use defer) before querying elements.
- Cache element lookups in const variables; use the exact ids and classes from the task.
- Small named functions, addEventListener instead of inline handlers, event delegation for repeated elements.
- Validate input and handle edge cases (empty values, division by zero, missing elements) without throwing.
- Keyboard support for anything clickable; use 'use strict' semantics and no global leaks beyond what the task names."#
        }
        FileKind::Other => {
            r#"General guidance:
- Produce the complete file in the conventional format for its extension.
- Keep it consistent with the other project files and the names given in the task."#
        }
    }
}

/// Per-step user prompt for the coder.
pub fn coder_user_prompt(task: &ImplementationTask, existing_content: &str) -> String {
    let guidance = language_guidance(FileKind::from_path(&task.filepath));
    let existing = if existing_content.is_empty() {
        "(file does not exist yet)"
    } else {
        existing_content
    };
    format!(
        "Task: {task}\nFile: {path}\n\n{guidance}\n\nExisting content:\n{existing}\n\nUse write_file(path, content) to save the complete file at {path}.",
        task = task.task_description,
        path = task.filepath,
    )
}

/// System prompt for the reviewer.
pub fn reviewer_system_prompt() -> &'static str {
    "You are the REVIEWER: a senior front-end engineer and designer reviewing a freshly generated website. Be concrete and constructive; cite file names and identifiers."
}

/// Reviewer request over `(path, preview)` pairs.
pub fn reviewer_prompt(files: &[(String, String)]) -> String {
    let listing = files
        .iter()
        .map(|(path, preview)| format!("### {path}\n```\n{preview}\n```"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        r#"Review the generated website files below (long files are truncated).

{listing}

Assess each area and give specific improvements:
1. Visual design - palette, typography, spacing, polish.
2. Code quality - structure, naming, consistency between files.
3. Responsiveness - behaviour across screen sizes.
4. Functionality - whether the features work as the markup and scripts imply.
5. Accessibility - semantics, labels, keyboard support, contrast.

Finish with an overall verdict."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_by_extension() {
        assert_eq!(FileKind::from_path("index.html"), FileKind::Markup);
        assert_eq!(FileKind::from_path("pages/About.HTM"), FileKind::Markup);
        assert_eq!(FileKind::from_path("css/styles.css"), FileKind::Style);
        assert_eq!(FileKind::from_path("js/app.mjs"), FileKind::Script);
        assert_eq!(FileKind::from_path("README.md"), FileKind::Other);
        assert_eq!(FileKind::from_path("Makefile"), FileKind::Other);
    }

    #[test]
    fn coder_prompt_embeds_task_and_guidance() {
        let task = ImplementationTask {
            filepath: "styles.css".to_string(),
            task_description: "Style .calculator-container".to_string(),
        };
        let prompt = coder_user_prompt(&task, "");
        assert!(prompt.contains("Task: Style .calculator-container"));
        assert!(prompt.contains("File: styles.css"));
        assert!(prompt.contains("CSS guidance"));
        assert!(prompt.contains("(file does not exist yet)"));
    }

    #[test]
    fn coder_system_prompt_lists_tools() {
        let prompt = coder_system_prompt(&ToolRegistry::coder());
        assert!(prompt.contains("- **write_file**"));
        assert!(prompt.contains("NOT complete until write_file"));
    }
}
