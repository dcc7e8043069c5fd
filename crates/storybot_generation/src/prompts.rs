//! Prompt construction for text and image providers.
//!
//! Everything here is pure string building so it can be tested without
//! providers.

use storybot_core::{Book, Chapter};

/// Scene used when a chapter carries no illustration marker.
pub const FALLBACK_SCENE: &str =
    "A scene from a children's book featuring the main characters together";

/// Prior chapter summaries are cut to this many characters.
pub const PRIOR_SUMMARY_CHARS: usize = 200;

const STYLE_BASE: &str =
    "Children's book illustration, cartoon style, bright colors, friendly atmosphere";

/// Instruction for the translation call.
pub fn translation_system_prompt(target_language: &str) -> String {
    format!(
        "Translate the user's text into {}. Reply with the translation only, \
         without quotes or commentary. If the text is already in {}, return it unchanged.",
        target_language, target_language
    )
}

/// Prompt for a standalone character portrait used as a visual reference.
pub fn reference_portrait_prompt(name: &str, description: &str) -> String {
    format!(
        "Simple Disney-Pixar character portrait, minimalist 2D cartoon style, basic rounded features.\n\n\
         Character: {}\n{}\n\n\
         Create a small, simple character reference image: full figure, neutral pose, \
         facing the viewer. White background, no text, no other characters.",
        name, description
    )
}

/// Prompt for a scene that must keep referenced characters consistent.
///
/// `referenced` lists characters in the same order as the attached images;
/// each is named with its 1-based reference index. `others` are characters
/// without a reference image, given as `(name, description)`.
pub fn scene_with_references_prompt(
    scene: &str,
    referenced: &[&str],
    others: &[(String, String)],
    title: &str,
) -> String {
    let mut prompt = String::from(
        "Style: Disney-Pixar children's book illustration, soft lighting, bright friendly colors.\n\n",
    );

    prompt.push_str("Characters (maintain exact appearance from reference images):\n");
    for (i, name) in referenced.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {}: Reference image {} shows this character\n",
            i + 1,
            name,
            i + 1
        ));
    }

    if !others.is_empty() {
        prompt.push_str("\nAlso in the scene:\n");
        for (name, description) in others {
            prompt.push_str(&format!("- {}: {}\n", name, description));
        }
    }

    prompt.push_str(&format!("\nScene: {}\n", scene));
    prompt.push_str(&format!(
        "Composition: a single illustration for the children's book '{}', characters clearly visible.\n",
        title
    ));
    prompt.push_str(
        "Technical: keep every character's colors, proportions and clothing identical to the reference images. \
         No text or lettering in the image.",
    );
    prompt
}

/// Prompt-only illustration request with inline character descriptions.
pub fn legacy_illustration_prompt(scene: &str, roster: &[(String, String)], title: &str) -> String {
    let mut parts = vec![STYLE_BASE.to_string(), format!("Scene: {}", scene)];

    if !roster.is_empty() {
        let characters: Vec<String> = roster
            .iter()
            .map(|(name, description)| format!("{}: {}", name, description))
            .collect();
        parts.push(format!(
            "Characters should look like: {}",
            characters.join("; ")
        ));
    }

    parts.push(format!("This is for the children's book '{}'", title));
    parts.push("High quality, detailed, suitable for children".to_string());
    parts.push("No text or words in the image".to_string());
    parts.join(". ")
}

/// Shortens a chapter body for use in the "story so far" summary.
pub fn summarize_prior(content: &str) -> String {
    if content.chars().count() <= PRIOR_SUMMARY_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(PRIOR_SUMMARY_CHARS).collect();
    format!("{}...", head)
}

/// System instruction for chapter writing.
pub fn chapter_system_prompt() -> String {
    "You are a children's book author. Write warm, age-appropriate prose with simple \
     sentences and vivid images. Keep characters consistent with their descriptions."
        .to_string()
}

/// User prompt for the next chapter of a book.
///
/// `roster` holds `(name, description)` pairs; `prior` the existing chapters in order.
pub fn chapter_prompt(
    book: &Book,
    roster: &[(String, String)],
    prior: &[Chapter],
    hint: &str,
    target_words: usize,
) -> String {
    let number = prior.len() + 1;
    let mut prompt = format!(
        "Book: {}\nDescription: {}\n\nCharacters:\n",
        book.title(),
        book.description()
    );
    for (name, description) in roster {
        prompt.push_str(&format!("- {}: {}\n", name, description));
    }

    if prior.is_empty() {
        prompt.push_str("\nThis is the first chapter of the book.\n");
    } else {
        prompt.push_str("\nStory so far:\n");
        for chapter in prior {
            prompt.push_str(&format!(
                "Chapter {}: {}\n",
                chapter.number(),
                summarize_prior(chapter.content())
            ));
        }
    }

    let direction = if hint.trim().is_empty() {
        "Continue the story naturally."
    } else {
        hint.trim()
    };
    prompt.push_str(&format!("\nWhat should happen: {}\n", direction));

    prompt.push_str(&format!(
        "\nWrite chapter {} in about {} words. Somewhere in the text, on its own line, \
         add exactly one marker describing the best scene to illustrate, in the form \
         [ILLUSTRATION: short visual description of the scene].",
        number, target_words
    ));
    prompt
}

/// Prompt asking for `count` distinct illustration scenes as a JSON array.
pub fn scene_list_prompt(content: &str, roster: &[(String, String)], count: usize) -> String {
    let names: Vec<&str> = roster.iter().map(|(name, _)| name.as_str()).collect();
    format!(
        "Read this chapter of a children's book and choose {} different moments to illustrate, \
         in story order. Characters: {}.\n\n{}\n\n\
         Reply with a JSON array of exactly {} strings, each a short visual description of one scene. \
         Reply with the JSON array only.",
        count,
        names.join(", "),
        content,
        count
    )
}
