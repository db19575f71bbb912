// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Well-known hook events fired by the companion pipeline.

/// Raw user input, before anything else sees it. Context: `{message}`.
pub const USER_INPUT: &str = "user:input";
/// Just before the chat backend is called. Context: `{message}`.
/// Setting `cancel: true` skips the backend.
pub const BEFORE_LLM_REQUEST: &str = "before:llm:request";
/// After the chat backend replied. Context: `{message, response}`.
pub const AFTER_LLM_RESPONSE: &str = "after:llm:response";
/// Before speech synthesis. Context: `{text, emotion?}`.
pub const BEFORE_TTS: &str = "before:tts";
/// After speech synthesis. Context: `{text}`.
pub const AFTER_TTS: &str = "after:tts";
/// Before an image goes to the vision backend. Context: `{image, prompt?}`.
pub const BEFORE_VISION: &str = "before:vision";
/// After the vision backend described an image. Context: `{description}`.
pub const AFTER_VISION: &str = "after:vision";
/// Before a scenario is loaded. Context: `{name, options}`.
pub const SCENARIO_LOAD: &str = "scenario:load";

pub const ALL: &[&str] = &[
    USER_INPUT,
    BEFORE_LLM_REQUEST,
    AFTER_LLM_RESPONSE,
    BEFORE_TTS,
    AFTER_TTS,
    BEFORE_VISION,
    AFTER_VISION,
    SCENARIO_LOAD,
];
