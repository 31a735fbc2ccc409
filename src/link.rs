use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::directives::{CompileInfo, Library};
use crate::errors::{Result, SlideboltError};

const STATE_VERSION: u32 = 4;
const EDITOR_ID: u32 = 1;
const EDITOR_FONT_SCALE: f32 = 2.5;
const COMPILER_FONT_SCALE: f32 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientState {
    pub version: u32,
    pub content: Vec<LayoutItem>,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutItem {
    Row { content: Vec<LayoutItem> },
    Column { content: Vec<LayoutItem> },
    Component(Component),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "componentName", content = "componentState", rename_all = "camelCase")]
pub enum Component {
    CodeEditor(EditorState),
    Compiler(CompilerState),
    Output(OutputState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub id: u32,
    pub source: String,
    pub lang: String,
    pub options: EditorOptions,
    pub font_scale: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorOptions {
    pub compile_on_change: bool,
    pub colourise_asm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerState {
    pub source: u32,
    pub filters: Filters,
    pub options: String,
    pub compiler: String,
    pub libs: Vec<LinkLibrary>,
    pub lang: String,
    pub font_scale: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub comment_only: bool,
    pub directives: bool,
    pub intel: bool,
    pub labels: bool,
    pub trim: bool,
    pub execute: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkLibrary {
    pub name: String,
    pub ver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputState {
    pub compiler: u32,
}

impl From<&Library> for LinkLibrary {
    fn from(lib: &Library) -> Self {
        Self {
            name: lib.name.clone(),
            ver: lib.version.clone(),
        }
    }
}

impl ClientState {
    pub fn from_info(info: &CompileInfo, theme: &str) -> Self {
        let editor = LayoutItem::Component(Component::CodeEditor(EditorState {
            id: EDITOR_ID,
            source: info.source.clone(),
            lang: info.language.clone(),
            options: EditorOptions {
                compile_on_change: true,
                colourise_asm: true,
            },
            font_scale: EDITOR_FONT_SCALE,
        }));

        let compiler = LayoutItem::Component(Component::Compiler(CompilerState {
            source: EDITOR_ID,
            filters: Filters {
                comment_only: true,
                directives: true,
                intel: true,
                labels: true,
                trim: true,
                execute: info.execute,
            },
            options: info.options.clone(),
            compiler: info.compiler.clone(),
            libs: info.libs.iter().map(LinkLibrary::from).collect(),
            lang: info.language.clone(),
            font_scale: COMPILER_FONT_SCALE,
        }));

        let output = LayoutItem::Component(Component::Output(OutputState { compiler: 1 }));

        Self {
            version: STATE_VERSION,
            content: vec![LayoutItem::Row {
                content: vec![editor, LayoutItem::Column { content: vec![compiler, output] }],
            }],
            settings: Settings {
                theme: theme.to_string(),
            },
        }
    }
}

/// Build a link that opens the snippet on its Compiler Explorer instance
pub fn build_link(info: &CompileInfo, theme: &str) -> Result<String> {
    let state = ClientState::from_info(info, theme);
    let json = serde_json::to_string(&state)?;

    let mut base = info.base_url.clone();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(format!("{}#{}", base, urlencoding::encode(&json)))
}

/// Recover the JSON client state stored in a link's fragment
pub fn decode_link(link: &str) -> Result<Value> {
    let (_, fragment) = link
        .split_once('#')
        .ok_or_else(|| SlideboltError::invalid_link("missing fragment"))?;

    let json = urlencoding::decode(fragment)
        .map_err(|e| SlideboltError::invalid_link(format!("bad percent-encoding: {}", e)))?;

    Ok(serde_json::from_str(&json)?)
}
