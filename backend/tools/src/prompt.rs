/// Build the generation prompt for a tool from its name and description.
pub fn tool_prompt(name: &str, description: &str) -> String {
    format!(
        "Create a tool named \"{name}\" that {description}.\n\
         This is a tool, not a scene object. Declare exactly one entry point:\n\
         \n\
         function executeTool(context, parameters)\n\
         \x20 -- ...\n\
         end\n\
         \n\
         The context offers:\n\
         - context.objects: array of {{ id, kind, position = {{x, y, z}}, properties }}\n\
         - context.addObject(record) -> id, or nil and an error message\n\
         - context.updateObject(id, patch) -> true, or false and an error message\n\
         - context.deleteObject(id) -> true, or false and an error message\n\
         \n\
         A record looks like {{ kind = \"cube\" | \"sphere\" | \"text\",\n\
         \x20 position = {{x, y, z}}, color = \"#rrggbb\" }}.\n\
         Return a table describing what happened, for example {{ success = true }}.\n\
         Return only Lua code."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_name_description_and_entry_point() {
        let prompt = tool_prompt("Scatter", "places ten random cubes");
        assert!(prompt.contains("\"Scatter\""));
        assert!(prompt.contains("places ten random cubes"));
        assert!(prompt.contains("function executeTool(context, parameters)"));
    }

    #[test]
    fn lua_tables_are_written_literally() {
        let prompt = tool_prompt("Grid", "lays out cubes");
        assert!(prompt.contains("array of { id, kind, position = {x, y, z}, properties }"));
        assert!(prompt.contains("for example { success = true }."));
        assert!(!prompt.contains("{{"));
    }
}
