use crate::style::StylePreset;
use anyhow::Result;

/// Natural-language instructions prepended to every edit request
pub const BAKED_PROMPT: &str = concat!(
    "Reinterpret the attached reference as a single-object isometric top-down 3D icon in the 'Scapia 3D Icon – Isometric Matte+Gloss' style.",
    " Keep white background, orthographic camera, base matte with glossy accents, soft shadow.",
    " Generate 1024×1024 PNGs; no captions.",
    " Output should have a transparent background."
);

/// Explicit output constraints appended after the style JSON
const REQUIREMENTS: [&str; 2] = [
    "- 1024x1024 square",
    "- transparent background (no text/captions)",
];

/// Build the full instruction text: baked prompt, style JSON, then requirements
pub fn build_instruction(preset: &StylePreset) -> Result<String> {
    let style_json = preset.to_pretty_json()?;

    let mut lines = vec![
        BAKED_PROMPT,
        "",
        "Style JSON (do not change):",
        style_json.as_str(),
        "",
        "Requirements:",
    ];
    lines.extend(REQUIREMENTS);

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baked_prompt_sentences() {
        assert!(BAKED_PROMPT.starts_with("Reinterpret the attached reference"));
        assert!(BAKED_PROMPT.ends_with("Output should have a transparent background."));
        assert!(BAKED_PROMPT.contains("soft shadow. Generate 1024×1024 PNGs; no captions. Output"));
    }

    #[test]
    fn test_build_instruction_layout() {
        let preset = StylePreset::baked().unwrap();
        let instruction = build_instruction(&preset).unwrap();
        let lines: Vec<&str> = instruction.lines().collect();

        assert_eq!(lines[0], BAKED_PROMPT);
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Style JSON (do not change):");
        assert_eq!(lines[3], "{");
        assert_eq!(lines[lines.len() - 3], "Requirements:");
        assert_eq!(lines[lines.len() - 2], "- 1024x1024 square");
        assert_eq!(
            lines[lines.len() - 1],
            "- transparent background (no text/captions)"
        );
        assert!(instruction.contains(&preset.to_pretty_json().unwrap()));
    }
}
